//! Interface to the accounting system that supplies raw export documents.

use std::future::Future;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::cache::QueryWindow;
use crate::error::{TransportError, VouchError};

/// Collection the export request asks for.
pub const EXPORT_COLLECTION: &str = "VouchSalesVouchers";

/// One page of vouchers requested from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub window: QueryWindow,
    /// 1-based page number.
    pub page: u32,
    /// Voucher types the source should restrict the page to.
    pub voucher_types: Vec<String>,
}

impl SourceRequest {
    pub fn new(window: QueryWindow, page: u32) -> Self {
        Self {
            window,
            page,
            voucher_types: Vec::new(),
        }
    }

    pub fn with_voucher_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.voucher_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Render the XML export envelope for this request.
    pub fn to_xml(&self) -> Result<String, VouchError> {
        build_export_request(self)
    }
}

/// Channel that performs the actual request and returns the raw body.
///
/// Any error fails that fetch only; callers decide whether to retry.
pub trait DocumentSource: Send + Sync + 'static {
    fn fetch_raw(
        &self,
        request: &SourceRequest,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Build the XML export envelope for a page of a query window.
pub fn build_export_request(request: &SourceRequest) -> Result<String, VouchError> {
    let window = &request.window;
    let mut wr = Writer::new(Vec::new());

    open(&mut wr, "ENVELOPE")?;

    open(&mut wr, "HEADER")?;
    text_element(&mut wr, "VERSION", "1", None)?;
    text_element(&mut wr, "TALLYREQUEST", "Export", None)?;
    text_element(&mut wr, "TYPE", "Collection", None)?;
    text_element(&mut wr, "ID", EXPORT_COLLECTION, None)?;
    close(&mut wr, "HEADER")?;

    open(&mut wr, "BODY")?;
    open(&mut wr, "DESC")?;
    open(&mut wr, "STATICVARIABLES")?;
    text_element(&mut wr, "SVEXPORTFORMAT", "$$SysName:XML", None)?;
    text_element(&mut wr, "SVCURRENTCOMPANY", window.company_name(), None)?;
    text_element(&mut wr, "SVFROMDATE", window.from_date(), Some(("TYPE", "Date")))?;
    text_element(&mut wr, "SVTODATE", window.to_date(), Some(("TYPE", "Date")))?;
    text_element(&mut wr, "SVPAGENUMBER", &request.page.to_string(), None)?;
    text_element(&mut wr, "SVPAGESIZE", &window.page_size().to_string(), None)?;
    if !window.search_filter().is_empty() {
        text_element(&mut wr, "SVSEARCHFILTER", window.search_filter(), None)?;
    }
    for voucher_type in &request.voucher_types {
        text_element(&mut wr, "SVVOUCHERTYPE", voucher_type, None)?;
    }
    close(&mut wr, "STATICVARIABLES")?;
    close(&mut wr, "DESC")?;
    close(&mut wr, "BODY")?;

    close(&mut wr, "ENVELOPE")?;

    String::from_utf8(wr.into_inner()).map_err(|e| VouchError::Request(e.to_string()))
}

fn open(wr: &mut Writer<Vec<u8>>, name: &str) -> Result<(), VouchError> {
    wr.write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| VouchError::Request(e.to_string()))
}

fn close(wr: &mut Writer<Vec<u8>>, name: &str) -> Result<(), VouchError> {
    wr.write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| VouchError::Request(e.to_string()))
}

fn text_element(
    wr: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
    attribute: Option<(&str, &str)>,
) -> Result<(), VouchError> {
    let mut start = BytesStart::new(name);
    if let Some(attr) = attribute {
        start.push_attribute(attr);
    }
    wr.write_event(Event::Start(start))
        .map_err(|e| VouchError::Request(e.to_string()))?;
    wr.write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| VouchError::Request(e.to_string()))?;
    close(wr, name)
}
