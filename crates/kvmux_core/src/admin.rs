//! Cluster administration over the same multiplexer.

use crate::client::{expect_none, expect_text};
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::engine::{Connector, Engine};
use crate::error::ClientResult;
use crate::operation::{OneShotSink, StreamSink};
use crate::request::{Request, Response};
use crate::result::{PendingResult, ResultStream};

/// Administrative access to a cluster: space lifecycle and configuration.
///
/// Uses a single connection; the worker count in the configuration is
/// ignored.
pub struct Admin<E: Engine> {
    connection: Connection<E>,
}

impl<E: Engine> Admin<E> {
    /// Opens one engine handle through `connector`.
    pub fn connect<C>(connector: &C, config: ClientConfig) -> ClientResult<Self>
    where
        C: Connector<Engine = E>,
    {
        let engine = connector.connect(&config.address, config.port)?;
        Self::with_engine(engine, config)
    }

    /// Builds an admin handle from an engine that is already open.
    pub fn with_engine(engine: E, config: ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            connection: Connection::new(engine, config, 0)?,
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection<E> {
        &self.connection
    }

    fn one_shot<T>(
        &self,
        request: Request,
        convert: fn(Response) -> ClientResult<T>,
    ) -> ClientResult<PendingResult<T>> {
        let (sink, rx) = OneShotSink::channel();
        let id = self.connection.submit(request, Box::new(sink))?;
        Ok(PendingResult::new(id, rx, convert))
    }

    /// Dumps the cluster configuration.
    pub fn dump_config(&self) -> ClientResult<PendingResult<String>> {
        self.one_shot(Request::DumpConfig, expect_text)
    }

    /// Streams the name of every space.
    pub fn list_spaces(&self) -> ClientResult<ResultStream<String>> {
        let (sink, rx) = StreamSink::channel();
        let id = self.connection.submit(Request::ListSpaces, Box::new(sink))?;
        Ok(ResultStream::new(id, rx, expect_text))
    }

    /// Creates a space from its description.
    pub fn add_space(&self, description: &str) -> ClientResult<PendingResult<()>> {
        self.one_shot(
            Request::AddSpace {
                description: description.to_string(),
            },
            expect_none,
        )
    }

    /// Removes the named space.
    pub fn rm_space(&self, name: &str) -> ClientResult<PendingResult<()>> {
        self.one_shot(
            Request::RmSpace {
                name: name.to_string(),
            },
            expect_none,
        )
    }

    /// Checks a space description without creating the space. An invalid
    /// description completes with a failure.
    pub fn validate_space(&self, description: &str) -> ClientResult<PendingResult<()>> {
        self.one_shot(
            Request::ValidateSpace {
                description: description.to_string(),
            },
            expect_none,
        )
    }

    /// Closes the connection.
    pub fn close(&self) {
        self.connection.close();
    }
}
