//! Shared fixtures for unit tests.

use std::net::SocketAddr;

use axum::Router;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// Build a PDF with one content stream per page.
pub(crate) fn pdf_from_operations(pages: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = Object::Integer(kids.len() as i64);
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Build a PDF placing each `(x, y, text)` with its own text object, 10pt.
pub(crate) fn timetable_pdf(pages: &[&[(i64, i64, &str)]]) -> Vec<u8> {
    let pages = pages
        .iter()
        .map(|page| {
            page.iter()
                .flat_map(|&(x, y, text)| {
                    [
                        Operation::new("BT", vec![]),
                        Operation::new(
                            "Tf",
                            vec![Object::Name(b"F1".to_vec()), Object::Integer(10)],
                        ),
                        Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
                        Operation::new("Tj", vec![Object::string_literal(text)]),
                        Operation::new("ET", vec![]),
                    ]
                })
                .collect()
        })
        .collect();
    pdf_from_operations(pages)
}

/// A one-page timetable: three stops across the top, three trips below.
pub(crate) fn sample_timetable_pdf() -> Vec<u8> {
    timetable_pdf(&[&[
        (50, 790, "Route SH1 Timetable"),
        (50, 740, "Al Ghubaiba"),
        (200, 740, "Union"),
        (350, 740, "Dubai Mall"),
        (50, 720, "05:30"),
        (200, 720, "05:45"),
        (350, 720, "06:05"),
        (50, 700, "06:00"),
        (200, 700, "06:15"),
        (350, 700, "06:35"),
        (50, 680, "23:15"),
        (200, 680, "23:30"),
        (350, 680, "23:50"),
    ]])
}

/// Serve a router on an ephemeral local port.
pub(crate) async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A URL on a local port nothing listens on.
pub(crate) async fn unused_local_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/timetable")
}
