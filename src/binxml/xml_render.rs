//! XML rendering of a decoded [`Document`].
//!
//! Rendering never mutates the tree. Array expansion (an element whose dependency slot holds an
//! array is emitted once per item) is done through a per-scope override map from slot id to item
//! index, so the value table is intact after every call.

use crate::binxml::deserializer::MAX_NESTING_DEPTH;
use crate::binxml::value_render::ValueRenderer;
use crate::binxml::value_variant::{Value, ValueData};
use crate::err::{RenderError, RenderResult as Result};
use crate::model::{
    Attribute, Content, Document, Element, ElementBody, Fragment, FragmentBody,
    ProcessingInstruction, TemplateValues,
};
use crate::settings::ParserSettings;
use crate::utils::EscapeContext;

use ahash::RandomState;
use hashbrown::HashMap;
use std::fmt::Write;

/// The value table of the innermost template, plus the array items currently pinned by
/// element expansion.
struct Scope<'d> {
    values: Option<&'d TemplateValues>,
    overrides: HashMap<u16, usize, RandomState>,
    /// Nesting level of the template owning `values`.
    depth: usize,
}

impl<'d> Scope<'d> {
    fn new(values: Option<&'d TemplateValues>, depth: usize) -> Self {
        Scope {
            values,
            overrides: HashMap::with_hasher(RandomState::new()),
            depth,
        }
    }
}

/// A slot as seen from the current scope.
struct Resolved<'d> {
    value: &'d Value,
    /// All items, or the single pinned item when the slot is overridden.
    items: &'d [ValueData],
    overridden: bool,
}

impl Resolved<'_> {
    fn is_null(&self) -> bool {
        self.value.value_type.is_null()
    }
}

pub(crate) struct XmlRenderer<'s> {
    values: ValueRenderer<'s>,
    depth: usize,
}

impl<'s> XmlRenderer<'s> {
    pub(crate) fn new(settings: &'s ParserSettings) -> Self {
        XmlRenderer::with_depth(settings, 0)
    }

    pub(crate) fn with_depth(settings: &'s ParserSettings, depth: usize) -> Self {
        XmlRenderer {
            values: ValueRenderer::new(settings),
            depth,
        }
    }

    /// Runs `f` one nesting level deeper. Trees built by hand are not bound by the decoder's
    /// limit, so it is enforced here as well.
    fn descend(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(RenderError::MaxDepthExceeded {
                limit: MAX_NESTING_DEPTH,
            });
        }

        self.depth += 1;
        let res = f(self);
        self.depth -= 1;
        res
    }

    pub(crate) fn render_document<W: Write>(&mut self, document: &Document, out: &mut W) -> Result<()> {
        if let Some(pi) = &document.prolog {
            self.render_processing_instruction(pi, out)?;
        }

        let mut scope = Scope::new(None, self.depth);
        self.render_fragment(&document.fragment, &mut scope, out)?;

        if let Some(pi) = &document.misc {
            self.render_processing_instruction(pi, out)?;
        }
        Ok(())
    }

    fn render_fragment<'d, W: Write>(
        &mut self,
        fragment: &'d Fragment,
        scope: &mut Scope<'d>,
        out: &mut W,
    ) -> Result<()> {
        match &fragment.body {
            FragmentBody::Template(template) => {
                // A template starts a fresh scope: its own table, no overrides.
                self.descend(|r| {
                    let mut inner = Scope::new(Some(&template.values), r.depth);
                    r.render_fragment(&template.fragment, &mut inner, out)
                })
            }
            FragmentBody::Element(element) => self.render_element(element, scope, out),
        }
    }

    fn resolve<'d>(&self, scope: &Scope<'d>, id: u16) -> Result<Resolved<'d>> {
        let values = scope
            .values
            .ok_or(RenderError::SubstitutionOutsideTemplate { index: id })?;
        let value = values.get(id).ok_or(RenderError::SubstitutionOutOfRange {
            index: id,
            len: values.len(),
        })?;

        match scope.overrides.get(&id) {
            Some(&i) => Ok(Resolved {
                value,
                items: value.data.get(i..=i).unwrap_or(&[]),
                overridden: true,
            }),
            None => Ok(Resolved {
                value,
                items: &value.data,
                overridden: false,
            }),
        }
    }

    fn render_element<'d, W: Write>(
        &mut self,
        element: &'d Element,
        scope: &mut Scope<'d>,
        out: &mut W,
    ) -> Result<()> {
        self.descend(|r| r.render_element_expanded(element, scope, out))
    }

    /// Emits `element` once, or once per item when its dependency slot holds an array.
    fn render_element_expanded<'d, W: Write>(
        &mut self,
        element: &'d Element,
        scope: &mut Scope<'d>,
        out: &mut W,
    ) -> Result<()> {
        let Some(id) = element.dependency_id else {
            return self.render_element_once(element, scope, out);
        };

        let resolved = self.resolve(scope, id)?;
        if resolved.is_null() {
            return Ok(());
        }
        if !resolved.value.value_type.is_array || resolved.overridden {
            return self.render_element_once(element, scope, out);
        }

        let count = resolved.items.len();
        let mut res = Ok(());
        for i in 0..count {
            scope.overrides.insert(id, i);
            res = self.render_element_once(element, scope, out);
            if res.is_err() {
                break;
            }
        }
        scope.overrides.remove(&id);
        res
    }

    fn render_element_once<'d, W: Write>(
        &mut self,
        element: &'d Element,
        scope: &mut Scope<'d>,
        out: &mut W,
    ) -> Result<()> {
        write!(out, "<{}", element.name)?;

        for attribute in &element.attributes {
            if self.attribute_is_suppressed(attribute, scope)? {
                continue;
            }
            write!(out, " {}='", attribute.name)?;
            for content in &attribute.value {
                self.render_content(content, scope, EscapeContext::Attribute, out)?;
            }
            out.write_char('\'')?;
        }

        match &element.body {
            ElementBody::Empty => out.write_str(" />")?,
            ElementBody::Content(children) => {
                out.write_char('>')?;
                for content in children {
                    self.render_content(content, scope, EscapeContext::Text, out)?;
                }
                write!(out, "</{}>", element.name)?;
            }
        }
        Ok(())
    }

    /// An attribute is dropped when it would have no value: no content, an empty literal, or a
    /// substitution that resolves to a Null slot.
    fn attribute_is_suppressed(&self, attribute: &Attribute, scope: &Scope<'_>) -> Result<bool> {
        if attribute.value.is_empty() {
            return Ok(true);
        }

        for content in &attribute.value {
            match content {
                Content::Text(text) if text.is_empty() => return Ok(true),
                Content::Substitution(sub) | Content::OptionalSubstitution(sub) => {
                    if self.resolve(scope, sub.id)?.is_null() {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }
        Ok(false)
    }

    fn render_content<'d, W: Write>(
        &mut self,
        content: &'d Content,
        scope: &mut Scope<'d>,
        ctx: EscapeContext,
        out: &mut W,
    ) -> Result<()> {
        match content {
            Content::Element(element) => self.render_element(element, scope, out)?,
            Content::Text(text) => self.values.write_str(out, text, ctx)?,
            Content::CharRef(code) => write!(out, "&#{};", code)?,
            Content::EntityRef(name) => write!(out, "&{}", name)?,
            Content::CData(text) => {
                out.write_str("<![CDATA[")?;
                self.values.write_str(out, text, ctx)?;
                out.write_str("]]>")?;
            }
            Content::ProcessingInstruction(pi) => self.render_processing_instruction(pi, out)?,
            Content::Substitution(sub) => {
                let resolved = self.resolve(scope, sub.id)?;
                self.render_resolved(&resolved, scope.depth, ctx, out)?;
            }
            Content::OptionalSubstitution(sub) => {
                let resolved = self.resolve(scope, sub.id)?;
                if !resolved.is_null() {
                    self.render_resolved(&resolved, scope.depth, ctx, out)?;
                }
            }
        }
        Ok(())
    }

    fn render_resolved<W: Write>(
        &mut self,
        resolved: &Resolved<'_>,
        depth: usize,
        ctx: EscapeContext,
        out: &mut W,
    ) -> Result<()> {
        let value_type = resolved.value.value_type.value_type;
        if value_type.is_unsupported() {
            return Err(RenderError::UnsupportedValueType {
                code: value_type.to_u8(),
                name: value_type.name(),
            });
        }

        self.values.write_items(out, resolved.items, ctx, depth)
    }

    fn render_processing_instruction<W: Write>(
        &mut self,
        pi: &ProcessingInstruction,
        out: &mut W,
    ) -> Result<()> {
        if pi.data.is_empty() {
            write!(out, "<?{}?>", pi.target)?;
        } else {
            write!(out, "<?{} {}?>", pi.target, pi.data)?;
        }
        Ok(())
    }
}
