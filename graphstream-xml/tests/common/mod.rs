//! A book catalog model and its schema, shared by the XML tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Weak;

use chrono::{DateTime, FixedOffset};
use graphstream::{Shared, StreamContext, TypeDescriptor, TypeRegistry};

pub const CATALOG_SCHEMA: &str = r#"
<graphSchema>
  <objectCollection name="catalog" class="Vec">
    <objectGraph name="book" class="Book" customPropertiesNode="extra">
      <property name="isbn" use="REQUIRED" xmlAttribute="true"/>
      <property name="author.name"/>
      <property name="author.born"/>
      <property name="chapters">
        <objectGraph name="chapter" class="Chapter" parentProperty="book"/>
      </property>
      <property name="keywords" elementName="keyword"/>
    </objectGraph>
  </objectCollection>
</graphSchema>
"#;

#[derive(Debug, Default)]
pub struct Author {
    pub name: String,
    pub born: Option<i32>,
}

#[derive(Debug, Default)]
pub struct Chapter {
    pub title: String,
    pub pages: i32,
    pub book: Weak<RefCell<Book>>,
}

#[derive(Debug, Default)]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub author: Option<Shared<Author>>,
    pub chapters: Vec<Shared<Chapter>>,
    pub keywords: Vec<String>,
    pub published: Option<DateTime<FixedOffset>>,
    pub in_print: bool,
}

pub fn types() -> TypeRegistry {
    TypeRegistry::new()
        .with(
            TypeDescriptor::builder::<Author>("Author")
                .default_constructor()
                .field("name", |a: &Author| &a.name, |a, v| a.name = v)
                .field("born", |a: &Author| &a.born, |a, v| a.born = v)
                .build(),
        )
        .with(
            TypeDescriptor::builder::<Chapter>("Chapter")
                .default_constructor()
                .field("title", |c: &Chapter| &c.title, |c, v| c.title = v)
                .field("pages", |c: &Chapter| &c.pages, |c, v| c.pages = v)
                .field("book", |c: &Chapter| &c.book, |c, v| c.book = v)
                .build(),
        )
        .with(
            TypeDescriptor::builder::<Book>("Book")
                .default_constructor()
                .field("isbn", |b: &Book| &b.isbn, |b, v| b.isbn = v)
                .field("title", |b: &Book| &b.title, |b, v| b.title = v)
                .field("author", |b: &Book| &b.author, |b, v| b.author = v)
                .field("chapters", |b: &Book| &b.chapters, |b, v| b.chapters = v)
                .field("keywords", |b: &Book| &b.keywords, |b, v| b.keywords = v)
                .field("published", |b: &Book| &b.published, |b, v| b.published = v)
                .field("inPrint", |b: &Book| &b.in_print, |b, v| b.in_print = v)
                .build(),
        )
}

pub fn catalog_context() -> StreamContext {
    graphstream_xml::context_from_schema(CATALOG_SCHEMA, types()).unwrap()
}

pub fn chapter(title: &str, pages: i32) -> Shared<Chapter> {
    graphstream::shared(Chapter {
        title: title.to_string(),
        pages,
        book: Weak::new(),
    })
}

pub fn dune() -> Book {
    Book {
        isbn: "978-0441013593".to_string(),
        title: "Dune".to_string(),
        author: Some(graphstream::shared(Author {
            name: "Frank Herbert".to_string(),
            born: Some(1920),
        })),
        chapters: vec![chapter("Book One", 240)],
        keywords: vec!["classic".to_string()],
        published: None,
        in_print: true,
    }
}
