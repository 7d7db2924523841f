mod common;

use std::any::TypeId;
use std::convert::Infallible;
use std::collections::BTreeMap;

use common::*;
use facet_testhelpers::test;
use graphstream::{
    CallbackError, ClassMetadata, EventBuffer, GraphSchema, InstantiationInterceptor,
    ObjectCollection, ObjectConsumer, ObjectRef, StreamContext, StreamError, TypeDescriptor,
    Unmarshalled, Value, shared,
};

fn read(context: &StreamContext, doc: Doc) -> Result<Unmarshalled, StreamError<Infallible>> {
    let events = doc.build();
    context.unmarshaller().read(&mut events.parser())
}

fn orders_context() -> StreamContext {
    let schema = GraphSchema::collection(
        ObjectCollection::new("orders")
            .container("Vec")
            .graph(order_graph())
            .graph(customer_graph()),
    );
    StreamContext::new(&schema, types()).unwrap()
}

#[test]
fn missing_required_property_is_reported() {
    let context = order_context();
    let err = read(&context, Doc::new().open("order", &[]).leaf("note", "hi").close("order"))
        .unwrap_err();

    let missing = match err {
        StreamError::RequiredPropertyMissing(missing) => missing,
        other => panic!("expected a missing property, got {other:?}"),
    };
    assert_eq!(missing.graph, "order");
    assert_eq!(missing.property, "id");
    assert!(missing.path.contains("note=hi"), "{}", missing.path);
}

#[test]
fn an_empty_value_satisfies_a_required_property() {
    let context = order_context();
    let read = read(
        &context,
        Doc::new().open("order", &[("id", "")]).leaf("note", "hi").close("order"),
    )
    .unwrap();
    let order = read.single().and_then(|o| o.downcast::<Order>()).unwrap();
    assert_eq!(order.borrow().id, 0);
    assert_eq!(order.borrow().note.as_deref(), Some("hi"));
}

#[test]
fn a_root_without_values_reads_as_nothing() {
    let context = order_context();
    let read = read(&context, Doc::new().open("order", &[]).close("order")).unwrap();
    assert!(read.is_empty());
}

#[test]
fn the_first_value_of_a_property_wins() {
    let context = order_context();
    let read = read(
        &context,
        Doc::new()
            .open("order", &[("id", "1")])
            .leaf("note", "first")
            .leaf("note", "second")
            .close("order"),
    )
    .unwrap();
    let order = read.single().and_then(|o| o.downcast::<Order>()).unwrap();
    assert_eq!(order.borrow().note.as_deref(), Some("first"));
}

#[test]
fn surrounding_whitespace_is_trimmed() {
    let context = order_context();
    let read = read(
        &context,
        Doc::new()
            .open("order", &[("id", "4")])
            .text("\n  ")
            .leaf("note", "  fragile  ")
            .text("\n")
            .close("order"),
    )
    .unwrap();
    let order = read.single().and_then(|o| o.downcast::<Order>()).unwrap();
    assert_eq!(order.borrow().note.as_deref(), Some("fragile"));
}

#[test]
fn unmapped_elements_are_structure_errors() {
    let context = order_context();
    let err = read(
        &context,
        Doc::new().open("order", &[("id", "1")]).leaf("bogus", "x").close("order"),
    )
    .unwrap_err();
    let structure = match err {
        StreamError::Structure(structure) => structure,
        other => panic!("expected a structure error, got {other:?}"),
    };
    assert!(structure.message.contains("<bogus>"), "{}", structure.message);
    assert!(structure.path.starts_with("order["), "{}", structure.path);
}

#[test]
fn unmapped_attributes_are_structure_errors() {
    let context = order_context();
    let err = read(&context, Doc::new().open("order", &[("color", "red")]).close("order"))
        .unwrap_err();
    assert!(matches!(err, StreamError::Structure(_)), "{err:?}");
}

#[test]
fn unknown_roots_are_structure_errors() {
    let context = order_context();
    let err = read(&context, Doc::new().open("invoice", &[]).close("invoice")).unwrap_err();
    assert!(matches!(err, StreamError::Structure(_)), "{err:?}");
}

#[test]
fn text_directly_inside_an_object_is_rejected() {
    let context = order_context();
    let err = read(
        &context,
        Doc::new().open("order", &[("id", "1")]).text("loose").close("order"),
    )
    .unwrap_err();
    assert!(matches!(err, StreamError::Structure(_)), "{err:?}");
}

#[test]
fn unconvertible_text_is_a_conversion_error() {
    let context = order_context();
    let err = read(&context, Doc::new().open("order", &[("id", "seven")]).close("order"))
        .unwrap_err();
    let conversion = match err {
        StreamError::Conversion(conversion) => conversion,
        other => panic!("expected a conversion error, got {other:?}"),
    };
    assert_eq!(conversion.text, "seven");
}

#[test]
fn truncated_documents_are_rejected() {
    let context = order_context();
    let err = read(&context, Doc::new().open("order", &[("id", "1")]).open("note", &[]))
        .unwrap_err();
    assert!(matches!(err, StreamError::Structure(_)), "{err:?}");
}

#[test]
fn collections_hold_objects_of_several_graphs() {
    let context = orders_context();
    let read = read(
        &context,
        Doc::new()
            .open("orders", &[])
            .open("order", &[("id", "1")])
            .close("order")
            .open("customer", &[])
            .leaf("name", "Bea")
            .close("customer")
            .open("order", &[("id", "2")])
            .close("order")
            .close("orders"),
    )
    .unwrap();

    let objects = read.into_vec();
    assert_eq!(objects.len(), 3);
    assert!(objects[0].is::<Order>());
    assert_eq!(objects[1].downcast::<Customer>().unwrap().borrow().name, "Bea");
    assert_eq!(objects[2].downcast::<Order>().unwrap().borrow().id, 2);
}

#[test]
fn collection_roots_must_match() {
    let context = orders_context();
    let err = read(&context, Doc::new().open("invoices", &[]).close("invoices")).unwrap_err();
    let structure = match err {
        StreamError::Structure(structure) => structure,
        other => panic!("expected a structure error, got {other:?}"),
    };
    assert!(structure.message.contains("<orders>"), "{}", structure.message);
}

#[test]
fn collections_are_written_inside_their_root() {
    let context = orders_context();
    let objects = vec![
        ObjectRef::new(Order { id: 5, ..Order::default() }),
        ObjectRef::new(Customer {
            name: "Cy".to_string(),
            address: None,
        }),
    ];
    let mut events = EventBuffer::new();
    context.marshaller().write(&objects, &mut events).unwrap();

    let expected = Doc::new()
        .open("orders", &[])
        .open("order", &[("id", "5"), ("status", "Open")])
        .close("order")
        .open("customer", &[])
        .leaf("name", "Cy")
        .close("customer")
        .close("orders")
        .build();
    assert_eq!(events, expected);
}

#[derive(Default)]
struct Recorder {
    started: Vec<String>,
    ids: Vec<Option<i64>>,
}

impl ObjectConsumer for Recorder {
    fn start_object(&mut self, class: &ClassMetadata) -> Result<(), CallbackError> {
        self.started.push(class.name().to_string());
        Ok(())
    }

    fn end_object(&mut self, object: Option<ObjectRef>) -> Result<(), CallbackError> {
        self.ids
            .push(object.and_then(|o| o.downcast::<Order>()).map(|o| o.borrow().id));
        Ok(())
    }
}

#[test]
fn streaming_hands_each_root_to_the_consumer() {
    let context = orders_context();
    let events = Doc::new()
        .open("orders", &[])
        .open("order", &[("id", "1")])
        .close("order")
        .open("order", &[])
        .close("order")
        .open("order", &[("id", "3")])
        .close("order")
        .close("orders")
        .build();

    let mut recorder = Recorder::default();
    let read = context
        .streaming_unmarshaller(&mut recorder)
        .read(&mut events.parser())
        .unwrap();

    assert!(read.is_empty());
    assert_eq!(recorder.started, vec!["order", "order", "order"]);
    assert_eq!(recorder.ids, vec![Some(1), None, Some(3)]);
}

struct Refuse;

impl ObjectConsumer for Refuse {
    fn end_object(&mut self, _object: Option<ObjectRef>) -> Result<(), CallbackError> {
        Err("storage full".into())
    }
}

#[test]
fn consumer_failures_abort_the_read() {
    let context = order_context();
    let events = Doc::new().open("order", &[("id", "1")]).close("order").build();
    let mut refuse = Refuse;
    let err = context
        .streaming_unmarshaller(&mut refuse)
        .read(&mut events.parser())
        .unwrap_err();
    assert_eq!(err.to_string(), "callback failed: storage full");
}

#[test]
fn push_interface_matches_read() {
    let context = order_context();
    let mut unmarshaller = context.unmarshaller();
    unmarshaller
        .element_start::<()>("order", &[("id", "9")])
        .unwrap();
    unmarshaller.element_start::<()>("tag", &[]).unwrap();
    unmarshaller.text::<()>("fresh").unwrap();
    unmarshaller.element_end::<()>("tag").unwrap();
    unmarshaller.element_end::<()>("order").unwrap();

    let order = unmarshaller
        .finish::<()>()
        .unwrap()
        .single()
        .and_then(|o| o.downcast::<Order>())
        .unwrap();
    assert_eq!(order.borrow().id, 9);
    assert_eq!(order.borrow().tags, vec!["fresh"]);
}

/// Builds order lines itself, upper-casing the SKU.
struct LineFactory;

impl InstantiationInterceptor for LineFactory {
    fn new_object(
        &self,
        descriptor: &TypeDescriptor,
        properties: &BTreeMap<String, Value>,
    ) -> Option<ObjectRef> {
        if descriptor.name() != "OrderLine" {
            return None;
        }
        let sku = match properties.get("sku") {
            Some(Value::Text(sku)) => sku.to_uppercase(),
            _ => String::new(),
        };
        let quantity = match properties.get("quantity") {
            Some(Value::Int(quantity)) => *quantity,
            _ => 0,
        };
        Some(ObjectRef::from_shared(shared(OrderLine {
            sku,
            quantity,
            order: Default::default(),
        })))
    }
}

#[test]
fn interceptors_supply_instances() {
    let mut context = order_context();
    context.add_interceptor(LineFactory);

    let read = read(
        &context,
        Doc::new()
            .open("order", &[("id", "1")])
            .open("lines", &[])
            .open("line", &[])
            .leaf("sku", "ab-1")
            .leaf("quantity", "4")
            .close("line")
            .close("lines")
            .close("order"),
    )
    .unwrap();

    let order = read.single().and_then(|o| o.downcast::<Order>()).unwrap();
    let line = order.borrow().lines[0].clone();
    assert_eq!(line.borrow().sku, "AB-1");
    assert_eq!(line.borrow().quantity, 4);
    assert!(std::rc::Rc::ptr_eq(
        &line.borrow().order.upgrade().unwrap(),
        &order
    ));
}

#[test]
fn removed_interceptors_are_no_longer_consulted() {
    let mut context = order_context();
    context.add_interceptor(LineFactory);
    assert!(context.remove_interceptor(0).is_some());
    assert!(context.remove_interceptor(0).is_none());
    assert!(context.interceptors().is_empty());

    let read = read(
        &context,
        Doc::new()
            .open("order", &[("id", "1")])
            .open("lines", &[])
            .open("line", &[])
            .leaf("sku", "ab-1")
            .close("line")
            .close("lines")
            .close("order"),
    )
    .unwrap();

    let order = read.single().and_then(|o| o.downcast::<Order>()).unwrap();
    assert_eq!(order.borrow().lines[0].borrow().sku, "ab-1");
}

struct ReportAsOrder;

impl InstantiationInterceptor for ReportAsOrder {
    fn resolve_runtime_type(&self, object: &ObjectRef) -> Option<TypeId> {
        object.is::<Customer>().then(TypeId::of::<Order>)
    }
}

#[test]
fn interceptors_resolve_runtime_types() {
    let mut context = order_context();
    let customer = ObjectRef::new(Customer::default());
    assert_eq!(context.runtime_type(&customer), TypeId::of::<Customer>());

    context.add_interceptor(ReportAsOrder);
    assert_eq!(context.runtime_type(&customer), TypeId::of::<Order>());
    let order = ObjectRef::new(Order::default());
    assert_eq!(context.runtime_type(&order), TypeId::of::<Order>());
}
