mod common;

use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{FixedOffset, TimeZone};
use common::{Book, catalog_context, chapter, dune};
use facet_testhelpers::test;
use graphstream::{
    CallbackError, ClassMetadata, ObjectConsumer, ObjectRef, Shared, StreamError, Unmarshalled,
    Value,
};
use graphstream_xml::{SerializeOptions, XmlError, XmlParser, XmlWriter};
use indoc::indoc;

const DUNE_XML: &str = concat!(
    r#"<catalog><book isbn="978-0441013593">"#,
    "<author><name>Frank Herbert</name><born>1920</born></author>",
    "<chapters><chapter><title>Book One</title><pages>240</pages></chapter></chapters>",
    "<keyword>classic</keyword><title>Dune</title><inPrint>1</inPrint>",
    "</book></catalog>"
);

fn books(read: Unmarshalled) -> Vec<Shared<Book>> {
    read.into_vec()
        .into_iter()
        .map(|object| object.downcast::<Book>().unwrap())
        .collect()
}

#[test]
fn catalog_is_written_compactly() {
    let context = catalog_context();
    let catalog = vec![ObjectRef::new(dune())];
    let xml = graphstream_xml::to_string(&context, &catalog).unwrap();
    assert_eq!(xml, DUNE_XML);
}

#[test]
fn catalog_is_written_pretty() {
    let context = catalog_context();
    let catalog = vec![ObjectRef::new(dune())];
    let xml = graphstream_xml::to_string_pretty(&context, &catalog).unwrap();
    assert_eq!(
        xml,
        indoc! {r#"
            <catalog>
              <book isbn="978-0441013593">
                <author>
                  <name>Frank Herbert</name>
                  <born>1920</born>
                </author>
                <chapters>
                  <chapter>
                    <title>Book One</title>
                    <pages>240</pages>
                  </chapter>
                </chapters>
                <keyword>classic</keyword>
                <title>Dune</title>
                <inPrint>1</inPrint>
              </book>
            </catalog>
        "#}
    );
}

#[test]
fn declaration_and_custom_indent() {
    let context = catalog_context();
    let catalog: Vec<ObjectRef> = Vec::new();
    let options = SerializeOptions::new().indent("\t").declaration(true);
    let xml = graphstream_xml::to_string_with_options(&context, &catalog, &options).unwrap();
    assert_eq!(
        xml,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<catalog></catalog>\n"
    );
}

#[test]
fn catalog_reads_back() {
    let context = catalog_context();
    let read = graphstream_xml::from_str(&context, DUNE_XML).unwrap();
    let books = books(read);
    assert_eq!(books.len(), 1);

    let book = books[0].borrow();
    assert_eq!(book.isbn, "978-0441013593");
    assert_eq!(book.title, "Dune");
    assert!(book.in_print);
    assert_eq!(book.keywords, vec!["classic".to_string()]);
    assert_eq!(book.published, None);

    let author = book.author.as_ref().unwrap().borrow();
    assert_eq!(author.name, "Frank Herbert");
    assert_eq!(author.born, Some(1920));

    assert_eq!(book.chapters.len(), 1);
    let chapter = book.chapters[0].borrow();
    assert_eq!(chapter.title, "Book One");
    assert_eq!(chapter.pages, 240);
    let parent = chapter.book.upgrade().unwrap();
    assert!(Rc::ptr_eq(&parent, &books[0]));
}

#[test]
fn pretty_output_reads_back_to_the_same_document() {
    let context = catalog_context();
    let mut second = dune();
    second.isbn = "978-0553293357".to_string();
    second.title = "Foundation".to_string();
    second.author = None;
    second.chapters = vec![chapter("The Psychohistorians", 24), chapter("The Encyclopedists", 40)];
    second.keywords = vec!["empire".to_string(), "robots".to_string()];
    second.published = Some(
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(1951, 6, 1, 12, 0, 0)
            .unwrap(),
    );
    let catalog = vec![ObjectRef::new(dune()), ObjectRef::new(second)];

    let pretty = graphstream_xml::to_string_pretty(&context, &catalog).unwrap();
    let read = graphstream_xml::from_str(&context, &pretty).unwrap();
    let again = read.into_vec();
    assert_eq!(again.len(), 2);
    assert_eq!(graphstream_xml::to_string_pretty(&context, &again).unwrap(), pretty);

    let foundation = again[1].downcast::<Book>().unwrap();
    let foundation = foundation.borrow();
    assert_eq!(foundation.chapters.len(), 2);
    assert_eq!(foundation.chapters[1].borrow().title, "The Encyclopedists");
    assert!(foundation.author.is_none());
    assert_eq!(
        foundation.published.map(|d| d.to_rfc3339()),
        Some("1951-06-01T12:00:00+01:00".to_string())
    );
}

#[test]
fn markup_characters_survive_a_round_trip() {
    let context = catalog_context();
    let mut book = dune();
    book.isbn = "a\"b\nc<d>".to_string();
    book.title = "Tom & Jerry <Live>".to_string();
    let catalog = vec![ObjectRef::new(book)];

    let xml = graphstream_xml::to_string(&context, &catalog).unwrap();
    assert!(xml.contains(r#"isbn="a&quot;b&#10;c&lt;d&gt;""#), "{xml}");
    assert!(xml.contains("<title>Tom &amp; Jerry &lt;Live&gt;</title>"), "{xml}");

    let books = books(graphstream_xml::from_str(&context, &xml).unwrap());
    let book = books[0].borrow();
    assert_eq!(book.isbn, "a\"b\nc<d>");
    assert_eq!(book.title, "Tom & Jerry <Live>");
}

#[test]
fn namespace_prefixes_are_ignored() {
    let context = catalog_context();
    let xml = indoc! {r#"
        <?xml version="1.0"?>
        <!-- exported -->
        <c:catalog xmlns:c="urn:books">
          <c:book isbn="1">
            <c:title><![CDATA[Fish & Chips]]></c:title>
          </c:book>
        </c:catalog>
    "#};
    let books = books(graphstream_xml::from_str(&context, xml).unwrap());
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].borrow().isbn, "1");
    assert_eq!(books[0].borrow().title, "Fish & Chips");
}

#[test]
fn bytes_are_accepted() {
    let context = catalog_context();
    let bytes = graphstream_xml::to_vec(&context, &vec![ObjectRef::new(dune())]).unwrap();
    let read = graphstream_xml::from_slice(&context, &bytes).unwrap();
    assert_eq!(books(read)[0].borrow().title, "Dune");
}

#[derive(Default)]
struct Titles(Vec<String>, usize);

impl ObjectConsumer for Titles {
    fn start_object(&mut self, class: &ClassMetadata) -> Result<(), CallbackError> {
        assert_eq!(class.name(), "book");
        self.1 += 1;
        Ok(())
    }

    fn end_object(&mut self, object: Option<ObjectRef>) -> Result<(), CallbackError> {
        if let Some(book) = object.and_then(|o| o.downcast::<Book>()) {
            self.0.push(book.borrow().title.clone());
        }
        Ok(())
    }
}

#[test]
fn books_stream_to_a_consumer() {
    let context = catalog_context();
    let xml = r#"<catalog><book isbn="1"><title>A</title></book><book/><book isbn="2"><title>B</title></book></catalog>"#;
    let mut titles = Titles::default();
    graphstream_xml::from_str_with_consumer(&context, xml, &mut titles).unwrap();
    assert_eq!(titles.0, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(titles.1, 3);
}

#[test]
fn custom_properties_use_the_extra_element() {
    let context = catalog_context();
    let mut marshaller = context.marshaller();
    marshaller.add_property_reader(|_: &ObjectRef| {
        Some(BTreeMap::from([("edition".to_string(), Value::Int(2))]))
    });
    let mut writer = XmlWriter::new(Vec::new());
    let book = ObjectRef::new(Book {
        isbn: "1".to_string(),
        ..Book::default()
    });
    marshaller.write(&vec![book], &mut writer).unwrap();
    let xml = String::from_utf8(writer.into_inner()).unwrap();
    assert_eq!(
        xml,
        r#"<catalog><book isbn="1"><title></title><inPrint>0</inPrint><extra><edition>2</edition></extra></book></catalog>"#
    );

    let mut captured = Vec::new();
    let mut unmarshaller = context.unmarshaller();
    unmarshaller.add_property_writer(
        |_: &ObjectRef, pairs: &BTreeMap<String, String>| -> Result<(), CallbackError> {
            captured.push(pairs.clone());
            Ok(())
        },
    );
    let read = unmarshaller.read(&mut XmlParser::new(xml.as_bytes())).unwrap();
    assert_eq!(read.into_vec().len(), 1);
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].get("edition").map(String::as_str), Some("2"));
}

#[test]
fn malformed_documents_are_document_errors() {
    let context = catalog_context();

    let err = graphstream_xml::from_str(&context, "<catalog><book isbn=\"1\">").unwrap_err();
    assert!(matches!(err, StreamError::Document(XmlError::UnexpectedEof)), "{err:?}");

    let err = graphstream_xml::from_str(&context, "<catalog><book></catalog>").unwrap_err();
    assert!(matches!(err, StreamError::Document(XmlError::Parse(_))), "{err:?}");

    let err = graphstream_xml::from_str(&context, "<catalog>&bogus;</catalog>").unwrap_err();
    assert!(matches!(err, StreamError::Document(XmlError::Parse(_))), "{err:?}");
}

#[test]
fn mapping_errors_pass_through() {
    let context = catalog_context();

    let err = graphstream_xml::from_str(&context, "<shelf/>").unwrap_err();
    assert!(matches!(err, StreamError::Structure(_)), "{err:?}");

    let err = graphstream_xml::from_str(
        &context,
        "<catalog><book isbn=\"1\"><author><born>soon</born></author></book></catalog>",
    )
    .unwrap_err();
    assert!(matches!(err, StreamError::Conversion(_)), "{err:?}");

    let err = graphstream_xml::from_str(&context, "<catalog><book><title>X</title></book></catalog>")
        .unwrap_err();
    let missing = match err {
        StreamError::RequiredPropertyMissing(missing) => missing,
        other => panic!("expected a missing property, got {other:?}"),
    };
    assert_eq!(missing.property, "isbn");
}
