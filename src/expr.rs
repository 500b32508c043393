//! Filter and naming expressions.
//!
//! A small expression tree built by the query layer. The resolver walks it to
//! recognise key lookups written as filters, to detect type constraints, and
//! to render the filter string sent on the wire.

use std::fmt;

use serde_json::Value;

use crate::naming;
use crate::types::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

impl BinaryOp {
    fn keyword(self) -> &'static str {
        match self {
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            _ => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Property path, outermost segment first.
    Property(Vec<String>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    /// Type constraint on the current entity.
    IsOf(String),
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Property reference; `/` separates navigation segments.
    pub fn property(path: &str) -> Self {
        Expr::Property(path.split('/').map(str::to_string).collect())
    }

    pub fn is_of(type_name: impl Into<String>) -> Self {
        Expr::IsOf(type_name.into())
    }

    fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    pub fn eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn ne(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, right)
    }

    pub fn gt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn ge(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, right)
    }

    pub fn lt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn le(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, right)
    }

    pub fn and(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Column/value pairs of an expression made only of `property eq literal`
    /// terms joined by `and`.
    ///
    /// Returns `None` for anything else, including a column constrained twice.
    pub fn lookup_columns(&self) -> Option<Payload> {
        let mut columns = Payload::new();
        self.collect_lookup_columns(&mut columns).then_some(columns)
    }

    fn collect_lookup_columns(&self, columns: &mut Payload) -> bool {
        match self {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => left.collect_lookup_columns(columns) && right.collect_lookup_columns(columns),
            Expr::Binary {
                op: BinaryOp::Eq,
                left,
                right,
            } => {
                let (path, value) = match (left.as_ref(), right.as_ref()) {
                    (Expr::Property(path), Expr::Literal(value))
                    | (Expr::Literal(value), Expr::Property(path)) => (path, value),
                    _ => return false,
                };
                columns.insert(path.join("/"), value.clone()).is_none()
            }
            _ => false,
        }
    }

    /// Whether the expression narrows to `type_name`, alone or inside an `and`.
    pub fn has_type_constraint(&self, type_name: &str) -> bool {
        match self {
            Expr::IsOf(constraint) => {
                naming::simple_name(constraint) == naming::simple_name(type_name)
            }
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => left.has_type_constraint(type_name) || right.has_type_constraint(type_name),
            _ => false,
        }
    }

    /// The name an expression designates when used in place of a collection,
    /// derived type or link name.
    pub fn as_name(&self) -> Option<String> {
        match self {
            Expr::Property(path) => Some(path.join("/")),
            Expr::Literal(Value::String(name)) => Some(name.clone()),
            _ => None,
        }
    }

    /// Render as a filter string, spelling names the way `names` reports them.
    pub fn format_with(&self, names: &dyn FilterNames) -> String {
        match self {
            Expr::Literal(value) => format_literal(value),
            Expr::Property(path) => names.property_path(path),
            Expr::Binary { op, left, right } => format!(
                "{} {} {}",
                operand(left, *op, names),
                op.keyword(),
                operand(right, *op, names)
            ),
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Binary { .. } => format!("not ({})", inner.format_with(names)),
                _ => format!("not {}", inner.format_with(names)),
            },
            Expr::IsOf(type_name) => format!("isof('{}')", names.type_name(type_name)),
        }
    }

    /// Render with every name left as written.
    pub fn format(&self) -> String {
        self.format_with(&AsWritten)
    }
}

/// Spelling of the names a filter mentions, as the server declares them.
pub trait FilterNames {
    /// Property path joined into its wire form.
    fn property_path(&self, path: &[String]) -> String {
        path.join("/")
    }

    /// Type name used inside `isof`.
    fn type_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Leaves property paths and type names untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsWritten;

impl FilterNames for AsWritten {}

fn operand(expr: &Expr, parent: BinaryOp, names: &dyn FilterNames) -> String {
    match expr {
        // Comparisons never chain, so a nested comparison is always grouped.
        Expr::Binary { op, .. }
            if op.precedence() < parent.precedence()
                || (op.precedence() == 3 && parent.precedence() == 3) =>
        {
            format!("({})", expr.format_with(names))
        }
        _ => expr.format_with(names),
    }
}

fn format_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(Value::String(value))
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Literal(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_columns_from_conjunction() {
        let filter = Expr::property("OrderID")
            .eq(10248)
            .and(Expr::literal(11).eq(Expr::property("ProductID")));
        let columns = filter.lookup_columns().unwrap();
        assert_eq!(Value::Object(columns), json!({ "OrderID": 10248, "ProductID": 11 }));
    }

    #[test]
    fn lookup_columns_rejects_other_operators() {
        assert!(Expr::property("UnitPrice").gt(10).lookup_columns().is_none());
        assert!(Expr::property("A")
            .eq(1)
            .or(Expr::property("B").eq(2))
            .lookup_columns()
            .is_none());
        assert!(Expr::property("A").eq(Expr::property("B")).lookup_columns().is_none());
        assert!(Expr::property("A")
            .eq(1)
            .and(Expr::property("A").eq(2))
            .lookup_columns()
            .is_none());
    }

    #[test]
    fn type_constraint_inside_and() {
        let filter = Expr::is_of("NorthwindModel.Ship").and(Expr::property("ShipName").eq("Titanic"));
        assert!(filter.has_type_constraint("Ship"));
        assert!(!filter.has_type_constraint("Truck"));
        assert!(!Expr::is_of("Ship").not().has_type_constraint("Ship"));
    }

    #[test]
    fn format_filter_string() {
        let filter = Expr::property("CompanyName")
            .eq("O'Brien")
            .and(Expr::property("Country").eq("UK").or(Expr::property("Country").eq("US")));
        assert_eq!(
            filter.to_string(),
            "CompanyName eq 'O''Brien' and (Country eq 'UK' or Country eq 'US')"
        );
        assert_eq!(Expr::property("Category/CategoryName").eq(Value::Null).format(), "Category/CategoryName eq null");
        assert_eq!(Expr::property("Discontinued").eq(true).not().format(), "not (Discontinued eq true)");
    }

    struct Northwind;

    impl FilterNames for Northwind {
        fn property_path(&self, path: &[String]) -> String {
            path.iter().map(|s| s.to_uppercase()).collect::<Vec<_>>().join("/")
        }

        fn type_name(&self, name: &str) -> String {
            format!("NorthwindModel.{}", name)
        }
    }

    #[test]
    fn format_spells_names_through_lookup() {
        let filter = Expr::is_of("Ship").and(Expr::property("Category/Name").eq("Boats"));
        assert_eq!(
            filter.format_with(&Northwind),
            "isof('NorthwindModel.Ship') and CATEGORY/NAME eq 'Boats'"
        );
        assert_eq!(filter.format(), "isof('Ship') and Category/Name eq 'Boats'");
    }

    #[test]
    fn names_from_expressions() {
        assert_eq!(Expr::property("Products").as_name().as_deref(), Some("Products"));
        assert_eq!(Expr::from("Orders").as_name().as_deref(), Some("Orders"));
        assert!(Expr::literal(1).as_name().is_none());
    }
}
