//! A small order-processing model shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Weak;

use graphstream::{
    DocumentWriter, EventBuffer, GraphSchema, ObjectGraph, PropertyDecl, Shared, StreamContext,
    TypeDescriptor, TypeRegistry, enumeration,
};

#[derive(Debug, Default)]
pub struct Address {
    pub street: String,
    pub city: String,
}

#[derive(Debug, Default)]
pub struct Customer {
    pub name: String,
    pub address: Option<Shared<Address>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Status {
    #[default]
    Open,
    Shipped,
}

enumeration!(Status { Open, Shipped });

#[derive(Debug, Default)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: i32,
    pub order: Weak<RefCell<Order>>,
}

#[derive(Debug, Default)]
pub struct Order {
    pub id: i64,
    pub status: Status,
    pub customer: Option<Shared<Customer>>,
    pub lines: Vec<Shared<OrderLine>>,
    pub tags: Vec<String>,
    pub note: Option<String>,
}

pub fn address_type() -> TypeDescriptor {
    TypeDescriptor::builder::<Address>("Address")
        .default_constructor()
        .field("street", |a: &Address| &a.street, |a, v| a.street = v)
        .field("city", |a: &Address| &a.city, |a, v| a.city = v)
        .build()
}

pub fn customer_type() -> TypeDescriptor {
    TypeDescriptor::builder::<Customer>("Customer")
        .default_constructor()
        .field("name", |c: &Customer| &c.name, |c, v| c.name = v)
        .field("address", |c: &Customer| &c.address, |c, v| c.address = v)
        .build()
}

pub fn line_type() -> TypeDescriptor {
    TypeDescriptor::builder::<OrderLine>("OrderLine")
        .default_constructor()
        .field("sku", |l: &OrderLine| &l.sku, |l, v| l.sku = v)
        .field("quantity", |l: &OrderLine| &l.quantity, |l, v| l.quantity = v)
        .field("order", |l: &OrderLine| &l.order, |l, v| l.order = v)
        .build()
}

pub fn order_type() -> TypeDescriptor {
    TypeDescriptor::builder::<Order>("Order")
        .default_constructor()
        .field("id", |o: &Order| &o.id, |o, v| o.id = v)
        .field("status", |o: &Order| &o.status, |o, v| o.status = v)
        .field("customer", |o: &Order| &o.customer, |o, v| o.customer = v)
        .field("lines", |o: &Order| &o.lines, |o, v| o.lines = v)
        .field("tags", |o: &Order| &o.tags, |o, v| o.tags = v)
        .field("note", |o: &Order| &o.note, |o, v| o.note = v)
        .build()
}

pub fn types() -> TypeRegistry {
    TypeRegistry::new()
        .with(address_type())
        .with(customer_type())
        .with(line_type())
        .with(order_type())
}

pub fn customer_graph() -> ObjectGraph {
    ObjectGraph::new("customer", "Customer")
        .property(PropertyDecl::new("address.street"))
        .property(PropertyDecl::new("address.city"))
}

pub fn order_graph() -> ObjectGraph {
    ObjectGraph::new("order", "Order")
        .property(PropertyDecl::new("id").attribute().required())
        .property(PropertyDecl::new("status").attribute())
        .property(PropertyDecl::new("customer").graph(customer_graph()))
        .property(
            PropertyDecl::new("lines")
                .graph(ObjectGraph::new("line", "OrderLine").parent_property("order")),
        )
        .property(PropertyDecl::new("tags").element_name("tag"))
}

pub fn order_context() -> StreamContext {
    StreamContext::new(&GraphSchema::graph(order_graph()), types()).unwrap()
}

pub fn sample_order() -> Order {
    Order {
        id: 7,
        status: Status::Shipped,
        customer: Some(graphstream::shared(Customer {
            name: "Ann".to_string(),
            address: Some(graphstream::shared(Address {
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
            })),
        })),
        lines: vec![
            graphstream::shared(OrderLine {
                sku: "A-1".to_string(),
                quantity: 2,
                order: Weak::new(),
            }),
            graphstream::shared(OrderLine {
                sku: "B-2".to_string(),
                quantity: 1,
                order: Weak::new(),
            }),
        ],
        tags: vec!["gift".to_string(), "rush".to_string()],
        note: None,
    }
}

/// Builds documents event by event.
#[derive(Default)]
pub struct Doc(EventBuffer);

impl Doc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(mut self, name: &str, attributes: &[(&str, &str)]) -> Self {
        self.0.start_element(name).unwrap();
        for (key, value) in attributes {
            self.0.attribute(key, value).unwrap();
        }
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.0.characters(text).unwrap();
        self
    }

    pub fn close(mut self, name: &str) -> Self {
        self.0.end_element(name).unwrap();
        self
    }

    pub fn leaf(self, name: &str, text: &str) -> Self {
        self.open(name, &[]).text(text).close(name)
    }

    pub fn build(self) -> EventBuffer {
        self.0
    }
}
