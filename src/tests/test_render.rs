use super::builder::*;
use crate::err::{BinXmlError, RenderError};
use crate::model::{Content, Element, ElementBody, FragmentBody};
use crate::{
    BinXmlName, MAX_NESTING_DEPTH, ParserSettings, decode, ensure_env_logger_initialized, render,
    render_bytes, render_bytes_with_settings,
};

use pretty_assertions::assert_eq;

fn render_template(element: ElementSpec, values: Vec<(u8, Vec<u8>)>) -> String {
    render_bytes(&template_document(&template(element, values)), true).unwrap()
}

fn render_value(value: (u8, Vec<u8>)) -> String {
    let ty = value.0;
    render_template(element("V").child(Node::Sub(0, ty)), vec![value])
}

#[test]
fn test_end_to_end_self_closing_element() {
    ensure_env_logger_initialized();
    let bytes = element_document(&element("Foo").attr("bar", vec![text("baz")]));
    assert_eq!(render_bytes(&bytes, true).unwrap(), "<Foo bar='baz' />");
}

#[test]
fn test_value_type_coverage() {
    assert_eq!(render_value(u32_value(42)), "<V>42</V>");
    assert_eq!(render_value(string_value("abc")), "<V>abc</V>");
    assert_eq!(render_value(bool_value(true)), "<V>true</V>");
    assert_eq!(
        render_value(guid_value([0; 16])),
        "<V>{00000000-0000-0000-0000-000000000000}</V>"
    );
    assert_eq!(
        render_value(filetime_value(0)),
        "<V>1601-01-01T00:00:00.0000000Z</V>"
    );
    assert_eq!(
        render_value((HEXINT32, 0xbeefu32.to_le_bytes().to_vec())),
        "<V>0x0000beef</V>"
    );
    assert_eq!(render_value((BINARY, vec![0x01, 0xab])), "<V>01AB</V>");
    assert_eq!(
        render_value((SID, vec![0x01, 0x01, 0, 0, 0, 0, 0, 0x05, 0x12, 0, 0, 0])),
        "<V>S-1-5-18</V>"
    );
    assert_eq!(render_value((ANSI_STRING, b"ansi\0".to_vec())), "<V>ansi</V>");
    assert_eq!(render_value((REAL64, 2.5f64.to_le_bytes().to_vec())), "<V>2.5</V>");
}

#[test]
fn test_null_dependency_suppresses_element() {
    let rendered = render_template(
        element("Root").child(
            element("Opt")
                .depends_on(0)
                .child(text("never"))
                .node(),
        ),
        vec![null_value()],
    );
    assert_eq!(rendered, "<Root></Root>");
}

#[test]
fn test_scalar_dependency_renders_once() {
    let rendered = render_template(
        element("Root").child(element("Item").depends_on(0).child(Node::Sub(0, UINT32)).node()),
        vec![u32_value(7)],
    );
    assert_eq!(rendered, "<Root><Item>7</Item></Root>");
}

#[test]
fn test_array_dependency_expands_element() {
    let bytes = template_document(&template(
        element("Root").child(
            element("Item")
                .depends_on(0)
                .attr("n", vec![Node::Sub(0, UINT32 | ARRAY)])
                .child(Node::Sub(0, UINT32 | ARRAY))
                .node(),
        ),
        vec![u32_array_value(&[1, 2, 3])],
    ));
    let document = decode(&bytes).unwrap();

    let expected = "<Root><Item n='1'>1</Item><Item n='2'>2</Item><Item n='3'>3</Item></Root>";
    assert_eq!(render(&document, true).unwrap(), expected);
    // Rendering again gives the same result, the slot is untouched.
    assert_eq!(render(&document, true).unwrap(), expected);

    let FragmentBody::Template(template) = &document.fragment.body else {
        panic!("expected a template fragment");
    };
    assert_eq!(template.values.get(0).unwrap().data.len(), 3);
}

#[test]
fn test_empty_array_dependency_renders_nothing() {
    let rendered = render_template(
        element("Root").child(element("Item").depends_on(0).node()),
        vec![(UINT32 | ARRAY, Vec::new())],
    );
    assert_eq!(rendered, "<Root></Root>");
}

#[test]
fn test_array_without_dependency_is_comma_joined() {
    let rendered = render_template(
        element("V").child(Node::Sub(0, STRING | ARRAY)),
        vec![string_array_value(&["a", "b", "c"])],
    );
    assert_eq!(rendered, "<V>a,b,c</V>");
}

#[test]
fn test_attribute_suppression() {
    let rendered = render_template(
        element("E")
            .attr("empty", vec![text("")])
            .attr("null", vec![Node::Sub(0, 0x00)])
            .attr("optional", vec![Node::OptSub(0, 0x00)])
            .attr("mixed", vec![text("x"), Node::Sub(0, 0x00)])
            .attr("kept", vec![text("id-"), Node::Sub(1, UINT32)]),
        vec![null_value(), u32_value(5)],
    );
    assert_eq!(rendered, "<E kept='id-5' />");
}

#[test]
fn test_optional_substitution_of_null_renders_nothing() {
    let rendered = render_template(
        element("E").child(Node::OptSub(0, STRING)).child(text("!")),
        vec![null_value()],
    );
    assert_eq!(rendered, "<E>!</E>");
}

#[test]
fn test_references_and_cdata_framing() {
    let bytes = element_document(
        &element("E")
            .child(text("a"))
            .child(Node::CharRef(65))
            .child(Node::EntityRef("amp".to_string()))
            .child(Node::CData("x<y".to_string())),
    );

    assert_eq!(
        render_bytes(&bytes, true).unwrap(),
        "<E>a&#65;&amp<![CDATA[x&lt;y]]></E>"
    );
    assert_eq!(
        render_bytes(&bytes, false).unwrap(),
        "<E>a&#65;&amp<![CDATA[x<y]]></E>"
    );
}

#[test]
fn test_entity_reference_has_no_terminator() {
    let bytes = element_document(&element("E").child(Node::EntityRef("lt".to_string())));
    assert_eq!(render_bytes(&bytes, true).unwrap(), "<E>&lt</E>");
}

#[test]
fn test_escaping_follows_context_and_flag() {
    let bytes = element_document(
        &element("E")
            .attr("q", vec![text("it's <\"here\">")])
            .child(text("a<b & 'c'")),
    );

    assert_eq!(
        render_bytes(&bytes, true).unwrap(),
        "<E q='it&apos;s &lt;&quot;here&quot;&gt;'>a&lt;b &amp; 'c'</E>"
    );
    assert_eq!(
        render_bytes(&bytes, false).unwrap(),
        "<E q='it's <\"here\">'>a<b & 'c'</E>"
    );
}

#[test]
fn test_processing_instructions() {
    let mut bytes = pi("xml-stylesheet", "href='a.xsl'");
    bytes.extend(FRAGMENT_HEADER);
    bytes.extend(element("E").child(Node::Pi("inner".to_string(), "x".to_string())).encode());
    bytes.extend(pi("end", ""));
    bytes.push(0x00);

    assert_eq!(
        render_bytes(&bytes, true).unwrap(),
        "<?xml-stylesheet href='a.xsl'?><E><?inner x?></E><?end?>"
    );
}

#[test]
fn test_nested_binxml_renders_like_top_level() {
    let inner = element_document(&element("Inner").attr("k", vec![text("v")]));
    let top_level = render_bytes(&inner, true).unwrap();

    let rendered = render_template(
        element("Outer").child(Node::Sub(0, BINXML)),
        vec![binxml_value(inner)],
    );

    assert_eq!(top_level, "<Inner k='v' />");
    assert_eq!(rendered, format!("<Outer>{}</Outer>", top_level));
}

#[test]
fn test_nested_template_has_its_own_scope() {
    let inner = template_document(&template(
        element("Inner").child(Node::Sub(0, STRING)),
        vec![string_value("inner")],
    ));

    let rendered = render_template(
        element("Outer")
            .child(Node::Sub(1, BINXML))
            .child(Node::Sub(0, STRING)),
        vec![string_value("outer"), binxml_value(inner)],
    );
    assert_eq!(rendered, "<Outer><Inner>inner</Inner>outer</Outer>");
}

#[test]
fn test_unsupported_value_type_fails_loudly() {
    let bytes = template_document(&template(
        element("E").child(Node::Sub(0, EVT_HANDLE)),
        vec![(EVT_HANDLE, vec![1, 2, 3, 4])],
    ));

    // Decoding keeps the raw bytes, rendering refuses.
    let document = decode(&bytes).unwrap();
    let err = render(&document, true).unwrap_err();
    assert!(matches!(
        err,
        BinXmlError::Render(RenderError::UnsupportedValueType {
            code: 0x20,
            name: "EvtHandle"
        })
    ));
}

#[test]
fn test_substitution_out_of_range() {
    let bytes = template_document(&template(
        element("E").child(Node::Sub(5, UINT32)),
        vec![u32_value(1)],
    ));

    let err = render_bytes(&bytes, true).unwrap_err();
    assert!(matches!(
        err,
        BinXmlError::Render(RenderError::SubstitutionOutOfRange { index: 5, len: 1 })
    ));
}

#[test]
fn test_substitution_outside_template() {
    let bytes = element_document(&element("E").child(Node::Sub(0, UINT32)));

    let err = render_bytes(&bytes, true).unwrap_err();
    assert!(matches!(
        err,
        BinXmlError::Render(RenderError::SubstitutionOutsideTemplate { index: 0 })
    ));
}

#[test]
fn test_sample_event() {
    let rendered = render_bytes_with_settings(&sample_event(), &ParserSettings::default()).unwrap();

    assert_eq!(
        rendered,
        concat!(
            "<Event xmlns='http://schemas.microsoft.com/win/2004/08/events/event'>",
            "<System>",
            "<Provider Name='Microsoft-Windows-Security-Auditing' ",
            "Guid='{54545C85-9714-4AD4-A5BA-3E3B00286588}' />",
            "<EventID>4624</EventID>",
            "<TimeCreated SystemTime='2020-01-01T00:00:00.0000000Z' />",
            "<Computer>WORKSTATION</Computer>",
            "</System>",
            "<EventData>",
            "<Data Name='Item'>first</Data>",
            "<Data Name='Item'>second</Data>",
            "<Data Name='Flag'>true</Data>",
            "</EventData>",
            "</Event>"
        )
    );
}

#[test]
fn test_hand_built_tree_deeper_than_limit() {
    let mut document = decode(&nested_elements_document(MAX_NESTING_DEPTH)).unwrap();
    assert!(render(&document, true).is_ok());

    let FragmentBody::Element(root) = &mut document.fragment.body else {
        panic!("expected an element fragment");
    };
    let inner = std::mem::replace(
        root,
        Element {
            dependency_id: None,
            name: BinXmlName::new("wrapper"),
            attributes: Vec::new(),
            body: ElementBody::Empty,
        },
    );
    root.body = ElementBody::Content(vec![Content::Element(inner)]);

    assert!(matches!(
        render(&document, true),
        Err(BinXmlError::Render(RenderError::MaxDepthExceeded { limit: MAX_NESTING_DEPTH }))
    ));
}
