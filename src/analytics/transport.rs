//! Outbound analytics transports.
//!
//! The page picks one transport at init from configuration; it is never
//! re-detected per call. A transport whose script has not loaded reports
//! [`TransportError::Unavailable`] and the event is dropped.

use serde_json::{Map, Value};

pub use crate::config::TransportKind;

/// Open event parameter map. Keys serialize sorted.
pub type Params = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{0:?} transport is not available")]
    Unavailable(TransportKind),
}

pub trait Transport {
    fn kind(&self) -> TransportKind;

    fn send(&mut self, name: &str, params: &Params) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn kind(&self) -> TransportKind {
        (**self).kind()
    }

    fn send(&mut self, name: &str, params: &Params) -> Result<(), TransportError> {
        (**self).send(name, params)
    }
}

/// Tag-manager data layer: each event is pushed as `{event: name, ...params}`.
#[derive(Debug, Clone, Default)]
pub struct DataLayer {
    entries: Option<Vec<Value>>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self {
            entries: Some(Vec::new()),
        }
    }

    /// A page where the tag manager never loaded.
    pub fn unavailable() -> Self {
        Self { entries: None }
    }

    pub fn entries(&self) -> &[Value] {
        self.entries.as_deref().unwrap_or(&[])
    }
}

impl Transport for DataLayer {
    fn kind(&self) -> TransportKind {
        TransportKind::Datalayer
    }

    fn send(&mut self, name: &str, params: &Params) -> Result<(), TransportError> {
        let entries = self
            .entries
            .as_mut()
            .ok_or(TransportError::Unavailable(TransportKind::Datalayer))?;

        let mut entry = Map::with_capacity(params.len() + 1);
        entry.insert("event".to_string(), Value::String(name.to_string()));
        // Spread semantics: caller parameters override `event`.
        entry.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        entries.push(Value::Object(entry));
        Ok(())
    }
}

type GtagFn = Box<dyn FnMut(&str, &Params)>;

/// Direct `gtag('event', name, params)` calls.
#[derive(Default)]
pub struct Gtag {
    call: Option<GtagFn>,
}

impl Gtag {
    pub fn new(call: impl FnMut(&str, &Params) + 'static) -> Self {
        Self {
            call: Some(Box::new(call)),
        }
    }

    pub fn unavailable() -> Self {
        Self { call: None }
    }
}

impl std::fmt::Debug for Gtag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gtag")
            .field("loaded", &self.call.is_some())
            .finish()
    }
}

impl Transport for Gtag {
    fn kind(&self) -> TransportKind {
        TransportKind::Gtag
    }

    fn send(&mut self, name: &str, params: &Params) -> Result<(), TransportError> {
        let call = self
            .call
            .as_mut()
            .ok_or(TransportError::Unavailable(TransportKind::Gtag))?;
        call(name, params);
        Ok(())
    }
}

/// Pick the configured transport from the handles the page exposes.
///
/// A missing handle for the configured kind yields an unavailable transport;
/// the other handle is ignored.
pub fn select_transport(
    kind: TransportKind,
    gtag: Option<Gtag>,
    data_layer: Option<DataLayer>,
) -> Box<dyn Transport> {
    match kind {
        TransportKind::Gtag => Box::new(gtag.unwrap_or_else(Gtag::unavailable)),
        TransportKind::Datalayer => Box::new(data_layer.unwrap_or_else(DataLayer::unavailable)),
    }
}
