//! The decoded document tree.
//!
//! Every node is built in a single decode pass and is immutable afterwards; rendering only ever
//! borrows it.

use crate::binxml::name::BinXmlName;
use crate::binxml::value_variant::{Value, ValueTypeCode};
use crate::err::Result;
use crate::guid::Guid;

use serde::Serialize;

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Document {
    pub prolog: Option<ProcessingInstruction>,
    pub fragment: Fragment,
    pub misc: Option<ProcessingInstruction>,
}

impl Document {
    /// Serialize the decoded tree (not the rendered XML) as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Fragment {
    pub major_version: u8,
    pub minor_version: u8,
    pub flags: u8,
    pub body: FragmentBody,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum FragmentBody {
    Template(Template),
    Element(Element),
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Template {
    pub guid: Guid,
    /// Declared length of the template body, in bytes.
    pub data_size: u32,
    pub fragment: Box<Fragment>,
    pub values: TemplateValues,
}

/// The value table of a template instance, indexed by substitution slot id.
#[derive(Debug, PartialEq, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TemplateValues(pub Vec<Value>);

impl TemplateValues {
    pub fn get(&self, id: u16) -> Option<&Value> {
        self.0.get(usize::from(id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Element {
    /// Slot that decides whether (and how often) this element is rendered. `None` means always.
    pub dependency_id: Option<u16>,
    pub name: BinXmlName,
    pub attributes: Vec<Attribute>,
    pub body: ElementBody,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum ElementBody {
    /// `<name ... />`
    Empty,
    Content(Vec<Content>),
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Attribute {
    pub name: BinXmlName,
    pub value: Vec<Content>,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum Content {
    Element(Element),
    Text(String),
    CharRef(u16),
    EntityRef(BinXmlName),
    CData(String),
    ProcessingInstruction(ProcessingInstruction),
    Substitution(Substitution),
    OptionalSubstitution(Substitution),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct Substitution {
    pub id: u16,
    pub value_type: ValueTypeCode,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct ProcessingInstruction {
    pub target: BinXmlName,
    pub data: String,
}
