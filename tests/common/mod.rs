//! Shared Northwind-style fixtures.

#![allow(dead_code)]

use std::sync::Arc;

use odata_core::{
    EnumDef, FieldType, MemberDef, Payload, SchemaModel, Session, Settings, TypeDef,
};
use serde_json::{json, Value};

pub fn northwind_document() -> Value {
    json!({
        "namespace": "NorthwindModel",
        "entityTypes": [
            {
                "name": "Category",
                "key": ["CategoryID"],
                "properties": [
                    { "name": "CategoryID", "type": "Edm.Int32", "nullable": false },
                    { "name": "CategoryName", "type": "Edm.String" }
                ],
                "navigationProperties": [
                    { "name": "Products", "type": "NorthwindModel.Product", "collection": true }
                ]
            },
            {
                "name": "Product",
                "key": ["ProductID"],
                "properties": [
                    { "name": "ProductID", "type": "Edm.Int32", "nullable": false },
                    { "name": "ProductName", "type": "Edm.String" },
                    { "name": "UnitPrice", "type": "Edm.Decimal" }
                ],
                "navigationProperties": [
                    { "name": "Category", "type": "NorthwindModel.Category" }
                ]
            },
            {
                "name": "Order",
                "key": ["OrderID"],
                "alternateKeys": [["CustomerID"], ["ShipName", "ShipCity"]],
                "properties": [
                    { "name": "OrderID", "type": "Edm.Int32", "nullable": false },
                    { "name": "CustomerID", "type": "Edm.String" },
                    { "name": "ShipName", "type": "Edm.String" },
                    { "name": "ShipCity", "type": "Edm.String" }
                ]
            },
            {
                "name": "Order_Detail",
                "key": ["OrderID", "ProductID"],
                "properties": [
                    { "name": "OrderID", "type": "Edm.Int32" },
                    { "name": "ProductID", "type": "Edm.Int32" },
                    { "name": "Quantity", "type": "Edm.Int16" }
                ]
            },
            {
                "name": "Employee",
                "key": ["EmployeeID"],
                "properties": [
                    { "name": "EmployeeID", "type": "Edm.Int32", "nullable": false },
                    { "name": "FirstName", "type": "Edm.String" },
                    { "name": "LastName", "type": "Edm.String" }
                ],
                "navigationProperties": [
                    { "name": "Superior", "type": "NorthwindModel.Employee" },
                    { "name": "Subordinates", "type": "NorthwindModel.Employee", "collection": true }
                ]
            },
            {
                "name": "Transport",
                "abstract": true,
                "key": ["TransportID"],
                "properties": [{ "name": "TransportID", "type": "Edm.Int32" }]
            },
            {
                "name": "Ship",
                "baseType": "NorthwindModel.Transport",
                "properties": [{ "name": "ShipName", "type": "Edm.String" }]
            },
            {
                "name": "Truck",
                "baseType": "NorthwindModel.Transport",
                "properties": [{ "name": "TruckNumber", "type": "Edm.String" }]
            },
            {
                "name": "Animal",
                "key": ["AnimalID"],
                "properties": [
                    { "name": "AnimalID", "type": "Edm.Int32" },
                    { "name": "Name", "type": "Edm.String" }
                ]
            }
        ],
        "entitySets": [
            { "name": "Categories", "entityType": "Category" },
            { "name": "Products", "entityType": "Product" },
            { "name": "Orders", "entityType": "Order" },
            { "name": "Order_Details", "entityType": "Order_Detail" },
            { "name": "Employees", "entityType": "Employee" },
            { "name": "Transport", "entityType": "Transport" },
            { "name": "Animals", "entityType": "Animal" }
        ],
        "functions": [
            { "name": "ActiveProducts", "returnType": "NorthwindModel.Product", "returnsCollection": true },
            { "name": "ParseInt", "returnType": "Edm.Int32" }
        ]
    })
}

/// Register the native counterparts of the Northwind entity types.
pub fn define_types(session: &Session) {
    let types = session.types();

    types.define_enum(
        EnumDef::new("ProductStatus")
            .member("Active", 1)
            .member("Discontinued", 2),
    );
    types.define(
        TypeDef::new("Category")
            .namespace("NorthwindModel")
            .member(MemberDef::new("CategoryID", FieldType::Int))
            .member(MemberDef::new("CategoryName", FieldType::Text))
            .member(MemberDef::new(
                "Products",
                FieldType::list(FieldType::record("Product")),
            )),
    );
    types.define(
        TypeDef::new("Product")
            .namespace("NorthwindModel")
            .member(MemberDef::new("ProductID", FieldType::Int))
            .member(MemberDef::new("ProductName", FieldType::Text))
            .member(MemberDef::new("UnitPrice", FieldType::Float))
            .member(MemberDef::new("Status", FieldType::enumeration("ProductStatus")))
            .member(MemberDef::new("Category", FieldType::record("Category")))
            .member(MemberDef::new("Annotations", FieldType::Annotations)),
    );
    types.define(
        TypeDef::new("Transport")
            .namespace("NorthwindModel")
            .member(MemberDef::new("TransportID", FieldType::Int))
            .member(MemberDef::new("Annotations", FieldType::Annotations)),
    );
    types.define(
        TypeDef::new("Ship")
            .namespace("NorthwindModel")
            .extends("Transport")
            .member(MemberDef::new("Name", FieldType::Text).mapped_as("ShipName")),
    );
    types.define(
        TypeDef::new("Truck")
            .namespace("NorthwindModel")
            .extends("Transport")
            .member(MemberDef::new("TruckNumber", FieldType::Text)),
    );
    types.define(
        TypeDef::new("Animal")
            .namespace("NorthwindModel")
            .member(MemberDef::new("AnimalID", FieldType::Int))
            .member(MemberDef::new("Name", FieldType::Text))
            .dynamic_properties("DynamicProperties"),
    );
    types.define(
        TypeDef::new("Dog")
            .namespace("NorthwindModel")
            .extends("Animal")
            .member(MemberDef::new("Breed", FieldType::Text)),
    );
    types.define(TypeDef::anonymous(
        "OrderDetailKey",
        vec![
            MemberDef::new("OrderID", FieldType::Int),
            MemberDef::new("ProductID", FieldType::Int),
        ],
    ));
}

pub fn model() -> SchemaModel {
    SchemaModel::from_document(&northwind_document()).unwrap()
}

pub fn session_with(settings: Settings) -> Session {
    let model = model().with_name_matcher(settings.name_matcher.clone());
    let session = Session::new(settings, Arc::new(model));
    define_types(&session);
    session
}

pub fn session() -> Session {
    session_with(Settings::new())
}

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
