//! Routing of completed files to sinks.
//!
//! The [`Dispatcher`] owns a registry from [`DataType`] to [`Sink`]. Each
//! completed file is handed to exactly one sink (or none, when nothing is
//! registered for its type) and the dispatcher returns the
//! [`Acknowledgment`] the session sends back to the peer. Sink failures are
//! logged and do not change the acknowledgment: the file was reassembled,
//! and dispatch is attempted at most once.

use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{debug, warn};

use crate::{frame::DataType, reassembly::CompletedFile, sink::Sink};

/// Text sent back to the peer over the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acknowledgment(String);

impl Acknowledgment {
    /// Confirmation that `filename` was reassembled and handed off.
    ///
    /// # Examples
    ///
    /// ```
    /// use chunkstream::Acknowledgment;
    ///
    /// assert_eq!(
    ///     Acknowledgment::received("a.jpg").as_str(),
    ///     "File 'a.jpg' received and processed successfully."
    /// );
    /// ```
    #[must_use]
    pub fn received(filename: &str) -> Self {
        Self(format!(
            "File '{filename}' received and processed successfully."
        ))
    }

    /// Refusal of a chunk whose first-seen data type is not recognised.
    #[must_use]
    pub fn rejected(filename: &str, data_type: DataType) -> Self {
        Self(format!(
            "File '{filename}' rejected: unknown data type {}.",
            data_type.as_byte()
        ))
    }

    /// Borrow the acknowledgment text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// Encoded bytes written to the transport.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { self.0.as_bytes() }
}

impl fmt::Display for Acknowledgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Registry of sinks keyed by data type.
#[derive(Clone, Default)]
pub struct Dispatcher {
    routes: HashMap<DataType, Arc<dyn Sink>>,
    fallback: Option<Arc<dyn Sink>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<_> = self.routes.keys().map(ToString::to_string).collect();
        routes.sort();
        f.debug_struct("Dispatcher")
            .field("routes", &routes)
            .field("fallback", &self.fallback.as_ref().map(|_| "Some(<sink>)"))
            .finish()
    }
}

impl Dispatcher {
    /// Start building a dispatcher.
    #[must_use]
    pub fn builder() -> DispatcherBuilder { DispatcherBuilder::default() }

    /// Sink that would receive files of `data_type`.
    #[must_use]
    pub fn sink_for(&self, data_type: DataType) -> Option<&Arc<dyn Sink>> {
        self.routes.get(&data_type).or(self.fallback.as_ref())
    }

    /// Hand `file` to its sink and produce the acknowledgment for the peer.
    pub async fn dispatch(&self, file: &CompletedFile) -> Acknowledgment {
        match self.sink_for(file.data_type()) {
            Some(sink) => {
                if let Err(err) = sink.deliver(file).await {
                    crate::metrics::inc_sink_errors();
                    warn!(
                        filename = file.filename(),
                        data_type = %file.data_type(),
                        error = %err,
                        "sink failed to process file"
                    );
                }
            }
            None => debug!(
                filename = file.filename(),
                data_type = %file.data_type(),
                "no sink registered; discarding payload"
            ),
        }
        Acknowledgment::received(file.filename())
    }
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    inner: Dispatcher,
}

impl DispatcherBuilder {
    /// Route files of `data_type` to `sink`, replacing any earlier route.
    #[must_use]
    pub fn route(mut self, data_type: DataType, sink: impl Sink + 'static) -> Self {
        self.inner.routes.insert(data_type, Arc::new(sink));
        self
    }

    /// Route files of `data_type` to a sink shared with other routes.
    #[must_use]
    pub fn route_shared(mut self, data_type: DataType, sink: Arc<dyn Sink>) -> Self {
        self.inner.routes.insert(data_type, sink);
        self
    }

    /// Sink for types with no explicit route. Without one, such files are
    /// acknowledged and discarded.
    #[must_use]
    pub fn fallback(mut self, sink: impl Sink + 'static) -> Self {
        self.inner.fallback = Some(Arc::new(sink));
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Dispatcher { self.inner }
}
