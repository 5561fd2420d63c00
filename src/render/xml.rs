//! Small indented-XML writer shared by the document renderers.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::{Error, Result};

pub(crate) struct XmlDoc {
    writer: Writer<Vec<u8>>,
}

impl XmlDoc {
    pub(crate) fn new() -> Self {
        Self { writer: Writer::new_with_indent(Vec::new(), b' ', 2) }
    }

    pub(crate) fn open(&mut self, tag: &str) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(tag)))?;
        Ok(())
    }

    pub(crate) fn open_ns(&mut self, tag: &str, ns: &str) -> Result<()> {
        let start = BytesStart::new(tag).with_attributes([("xmlns", ns)]);
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    /// `<tag>text</tag>`, text escaped.
    pub(crate) fn leaf(&mut self, tag: &str, text: &str) -> Result<()> {
        self.open(tag)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(tag)
    }

    pub(crate) fn close(&mut self, tag: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| Error::Render(format!("document is not UTF-8: {e}")))
    }
}
