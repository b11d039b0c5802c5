use crate::binxml::deserializer::decode_document;
use crate::err::Result;
use crate::model::Document;
use crate::settings::ParserSettings;
use crate::{render_bytes_with_settings, render_with_settings};

use log::debug;
#[cfg(feature = "multithreading")]
use log::warn;
#[cfg(feature = "multithreading")]
use rayon::prelude::*;
use std::sync::Arc;

/// Decodes and renders many independent BinXML buffers with one set of options.
///
/// With the `multithreading` feature, batches are spread over a rayon pool sized by
/// [`ParserSettings::num_threads`]; otherwise they run sequentially. Results keep the input
/// order, and one failing buffer does not affect the others.
#[derive(Debug, Clone, Default)]
pub struct BinXmlParser {
    settings: Arc<ParserSettings>,
}

impl BinXmlParser {
    pub fn new() -> Self {
        BinXmlParser::default()
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.settings = Arc::new(configuration);
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn decode(&self, data: &[u8]) -> Result<Document> {
        Ok(decode_document(data, &self.settings)?)
    }

    pub fn render(&self, document: &Document) -> Result<String> {
        render_with_settings(document, &self.settings)
    }

    pub fn render_bytes(&self, data: &[u8]) -> Result<String> {
        render_bytes_with_settings(data, &self.settings)
    }

    pub fn decode_many<B>(&self, inputs: &[B]) -> Vec<Result<Document>>
    where
        B: AsRef<[u8]> + Sync,
    {
        self.map_inputs(inputs, |data| self.decode(data))
    }

    pub fn render_many<B>(&self, inputs: &[B]) -> Vec<Result<String>>
    where
        B: AsRef<[u8]> + Sync,
    {
        self.map_inputs(inputs, |data| self.render_bytes(data))
    }

    #[cfg(feature = "multithreading")]
    fn map_inputs<B, T, F>(&self, inputs: &[B], f: F) -> Vec<T>
    where
        B: AsRef<[u8]> + Sync,
        T: Send,
        F: Fn(&[u8]) -> T + Sync + Send,
    {
        let num_threads = self.settings.get_num_threads();
        debug!(
            "Processing {} buffers with {} threads",
            inputs.len(),
            num_threads
        );

        match rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
        {
            Ok(pool) => pool.install(|| inputs.par_iter().map(|b| f(b.as_ref())).collect()),
            Err(e) => {
                warn!("Failed to build a thread pool ({}), falling back to a single thread", e);
                inputs.iter().map(|b| f(b.as_ref())).collect()
            }
        }
    }

    #[cfg(not(feature = "multithreading"))]
    fn map_inputs<B, T, F>(&self, inputs: &[B], f: F) -> Vec<T>
    where
        B: AsRef<[u8]> + Sync,
        T: Send,
        F: Fn(&[u8]) -> T + Sync + Send,
    {
        debug!("Processing {} buffers sequentially", inputs.len());
        inputs.iter().map(|b| f(b.as_ref())).collect()
    }
}
