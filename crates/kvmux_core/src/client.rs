//! The typed client: a pool of connections and the operation surface.

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::engine::{Connector, Engine};
use crate::error::{ClientError, ClientResult};
use crate::operation::{OneShotSink, StreamSink};
use crate::request::{MapOp, MutateOp, Request, Response, SortOrder};
use crate::result::{PendingResult, ResultStream};
use crate::state::ConnectionStats;
use kvmux_codec::{
    pack, pack_attributes, pack_checks, pack_map_attributes, unpack_attributes, Attributes,
    MapAttribute, Predicate, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// A client for a key-value cluster.
///
/// Holds `workers` connections, each with its own engine handle and
/// dispatcher thread, and spreads new operations over them round-robin.
/// Every operation marshals its arguments first; a value that cannot be
/// packed fails the call with [`ClientError::Codec`] and nothing is sent.
///
/// # Example
///
/// ```ignore
/// let client = Client::connect(&connector, ClientConfig::new("127.0.0.1", 1982))?;
///
/// let mut attrs = Attributes::new();
/// attrs.insert("name".into(), Value::from("alice"));
/// client.put("users", "alice", &attrs)?.wait()?;
///
/// let user = client.get("users", "alice")?.wait()?;
/// ```
pub struct Client<E: Engine> {
    connections: Vec<Connection<E>>,
    next: AtomicUsize,
}

impl<E: Engine> Client<E> {
    /// Opens `config.workers` engine handles through `connector`.
    pub fn connect<C>(connector: &C, config: ClientConfig) -> ClientResult<Self>
    where
        C: Connector<Engine = E>,
    {
        let mut engines = Vec::with_capacity(config.workers);
        for _ in 0..config.workers {
            match connector.connect(&config.address, config.port) {
                Ok(engine) => engines.push(engine),
                Err(err) => {
                    engines.iter().for_each(Engine::close);
                    return Err(err);
                }
            }
        }
        Self::with_engines(engines, config)
    }

    /// Builds a client from engine handles that are already open.
    pub fn with_engines(engines: Vec<E>, config: ClientConfig) -> ClientResult<Self> {
        if engines.is_empty() {
            return Err(ClientError::Connect {
                address: config.address,
                port: config.port,
                message: "no engine handles".into(),
            });
        }
        let connections = engines
            .into_iter()
            .enumerate()
            .map(|(index, engine)| Connection::new(engine, config.clone(), index))
            .collect::<ClientResult<Vec<_>>>()?;
        debug!(
            workers = connections.len(),
            address = %config.address,
            port = config.port,
            "client connected"
        );
        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Number of connections.
    pub fn workers(&self) -> usize {
        self.connections.len()
    }

    /// The connections, in pool order.
    pub fn connections(&self) -> &[Connection<E>] {
        &self.connections
    }

    /// Operations pending across every connection.
    pub fn pending_len(&self) -> usize {
        self.connections.iter().map(Connection::pending_len).sum()
    }

    /// Statistics summed over every connection.
    pub fn stats(&self) -> ConnectionStats {
        let mut total = ConnectionStats::default();
        for conn in &self.connections {
            total.merge(&conn.stats());
        }
        total
    }

    /// Closes every connection. Pending operations fail with
    /// [`ClientError::Closed`].
    pub fn close(&self) {
        for conn in &self.connections {
            conn.close();
        }
    }

    fn pick(&self) -> &Connection<E> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        &self.connections[n % self.connections.len()]
    }

    /// Submits a one-shot request on the next connection.
    pub fn submit<T>(
        &self,
        request: Request,
        convert: fn(Response) -> ClientResult<T>,
    ) -> ClientResult<PendingResult<T>> {
        let (sink, rx) = OneShotSink::channel();
        let id = self.pick().submit(request, Box::new(sink))?;
        Ok(PendingResult::new(id, rx, convert))
    }

    /// Submits a streaming request on the next connection.
    pub fn submit_stream<T>(
        &self,
        request: Request,
        convert: fn(Response) -> ClientResult<T>,
    ) -> ClientResult<ResultStream<T>> {
        let (sink, rx) = StreamSink::channel();
        let id = self.pick().submit(request, Box::new(sink))?;
        Ok(ResultStream::new(id, rx, convert))
    }

    /// Fetches every attribute of the object at `key`.
    pub fn get(&self, space: &str, key: impl Into<Value>) -> ClientResult<PendingResult<Attributes>> {
        let request = Request::Get {
            space: space.to_string(),
            key: pack(&key.into())?,
        };
        self.submit(request, expect_object)
    }

    /// Fetches the named attributes of the object at `key`.
    pub fn get_partial(
        &self,
        space: &str,
        key: impl Into<Value>,
        attributes: &[&str],
    ) -> ClientResult<PendingResult<Attributes>> {
        let request = Request::GetPartial {
            space: space.to_string(),
            key: pack(&key.into())?,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        };
        self.submit(request, expect_object)
    }

    /// Writes `attributes`, creating the object if needed.
    pub fn put(
        &self,
        space: &str,
        key: impl Into<Value>,
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        self.mutate(MutateOp::Put, space, key, attributes)
    }

    /// Creates the object; fails with `CmpFail` if it already exists.
    pub fn put_if_not_exist(
        &self,
        space: &str,
        key: impl Into<Value>,
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        self.mutate(MutateOp::PutIfNotExist, space, key, attributes)
    }

    /// Writes `attributes` if every check holds.
    pub fn cond_put(
        &self,
        space: &str,
        key: impl Into<Value>,
        checks: &[Predicate],
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        self.cond_mutate(MutateOp::Put, space, key, checks, attributes)
    }

    /// Deletes the object at `key`.
    pub fn del(&self, space: &str, key: impl Into<Value>) -> ClientResult<PendingResult<()>> {
        self.cond_del(space, key, &[])
    }

    /// Deletes the object at `key` if every check holds.
    pub fn cond_del(
        &self,
        space: &str,
        key: impl Into<Value>,
        checks: &[Predicate],
    ) -> ClientResult<PendingResult<()>> {
        let request = Request::Del {
            space: space.to_string(),
            key: pack(&key.into())?,
            checks: pack_checks(checks)?,
        };
        self.submit(request, expect_none)
    }

    /// Deletes every object matching `checks` and returns how many.
    pub fn group_del(&self, space: &str, checks: &[Predicate]) -> ClientResult<PendingResult<u64>> {
        let request = Request::GroupDel {
            space: space.to_string(),
            checks: pack_checks(checks)?,
        };
        self.submit(request, expect_count)
    }

    /// Applies `op` to the object at `key`.
    pub fn mutate(
        &self,
        op: MutateOp,
        space: &str,
        key: impl Into<Value>,
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        self.cond_mutate(op, space, key, &[], attributes)
    }

    /// Applies `op` to the object at `key` if every check holds.
    pub fn cond_mutate(
        &self,
        op: MutateOp,
        space: &str,
        key: impl Into<Value>,
        checks: &[Predicate],
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        let request = Request::Mutate {
            op,
            space: space.to_string(),
            key: pack(&key.into())?,
            checks: pack_checks(checks)?,
            attributes: pack_attributes(attributes)?,
        };
        self.submit(request, expect_none)
    }

    /// Applies `op` to every object matching `checks` and returns how many.
    pub fn group_mutate(
        &self,
        op: MutateOp,
        space: &str,
        checks: &[Predicate],
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<u64>> {
        let request = Request::GroupMutate {
            op,
            space: space.to_string(),
            checks: pack_checks(checks)?,
            attributes: pack_attributes(attributes)?,
        };
        self.submit(request, expect_count)
    }

    /// Applies `op` to map entries of the object at `key`.
    pub fn map_mutate(
        &self,
        op: MapOp,
        space: &str,
        key: impl Into<Value>,
        entries: &[MapAttribute],
    ) -> ClientResult<PendingResult<()>> {
        self.cond_map_mutate(op, space, key, &[], entries)
    }

    /// Applies `op` to map entries of the object at `key` if every check holds.
    pub fn cond_map_mutate(
        &self,
        op: MapOp,
        space: &str,
        key: impl Into<Value>,
        checks: &[Predicate],
        entries: &[MapAttribute],
    ) -> ClientResult<PendingResult<()>> {
        let request = Request::MapMutate {
            op,
            space: space.to_string(),
            key: pack(&key.into())?,
            checks: pack_checks(checks)?,
            attributes: pack_map_attributes(entries)?,
        };
        self.submit(request, expect_none)
    }

    /// Applies `op` to map entries of every object matching `checks`.
    pub fn group_map_mutate(
        &self,
        op: MapOp,
        space: &str,
        checks: &[Predicate],
        entries: &[MapAttribute],
    ) -> ClientResult<PendingResult<u64>> {
        let request = Request::GroupMapMutate {
            op,
            space: space.to_string(),
            checks: pack_checks(checks)?,
            attributes: pack_map_attributes(entries)?,
        };
        self.submit(request, expect_count)
    }

    /// Adds to numeric attributes.
    pub fn atomic_add(
        &self,
        space: &str,
        key: impl Into<Value>,
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        self.mutate(MutateOp::AtomicAdd, space, key, attributes)
    }

    /// Appends to string attributes.
    pub fn string_append(
        &self,
        space: &str,
        key: impl Into<Value>,
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        self.mutate(MutateOp::StringAppend, space, key, attributes)
    }

    /// Pushes onto the back of list attributes.
    pub fn list_rpush(
        &self,
        space: &str,
        key: impl Into<Value>,
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        self.mutate(MutateOp::ListRpush, space, key, attributes)
    }

    /// Adds elements to set attributes.
    pub fn set_add(
        &self,
        space: &str,
        key: impl Into<Value>,
        attributes: &Attributes,
    ) -> ClientResult<PendingResult<()>> {
        self.mutate(MutateOp::SetAdd, space, key, attributes)
    }

    /// Inserts or overwrites map entries.
    pub fn map_add(
        &self,
        space: &str,
        key: impl Into<Value>,
        entries: &[MapAttribute],
    ) -> ClientResult<PendingResult<()>> {
        self.map_mutate(MapOp::Add, space, key, entries)
    }

    /// Streams every object matching `checks`.
    pub fn search(&self, space: &str, checks: &[Predicate]) -> ClientResult<ResultStream<Attributes>> {
        let request = Request::Search {
            space: space.to_string(),
            checks: pack_checks(checks)?,
        };
        self.submit_stream(request, expect_object)
    }

    /// Streams up to `limit` matching objects ordered by `sort_by`.
    pub fn sorted_search(
        &self,
        space: &str,
        checks: &[Predicate],
        sort_by: &str,
        limit: u64,
        order: SortOrder,
    ) -> ClientResult<ResultStream<Attributes>> {
        let request = Request::SortedSearch {
            space: space.to_string(),
            checks: pack_checks(checks)?,
            sort_by: sort_by.to_string(),
            limit,
            order,
        };
        self.submit_stream(request, expect_object)
    }

    /// Describes how a search over `checks` would run.
    pub fn search_describe(
        &self,
        space: &str,
        checks: &[Predicate],
    ) -> ClientResult<PendingResult<String>> {
        let request = Request::SearchDescribe {
            space: space.to_string(),
            checks: pack_checks(checks)?,
        };
        self.submit(request, expect_text)
    }

    /// Counts the objects matching `checks`.
    pub fn count(&self, space: &str, checks: &[Predicate]) -> ClientResult<PendingResult<u64>> {
        let request = Request::Count {
            space: space.to_string(),
            checks: pack_checks(checks)?,
        };
        self.submit(request, expect_count)
    }
}

pub(crate) fn expect_object(response: Response) -> ClientResult<Attributes> {
    match response {
        Response::Object(packed) => Ok(unpack_attributes(&packed)?),
        _ => Err(ClientError::UnexpectedResponse { expected: "object" }),
    }
}

pub(crate) fn expect_none(response: Response) -> ClientResult<()> {
    match response {
        Response::None => Ok(()),
        _ => Err(ClientError::UnexpectedResponse { expected: "nothing" }),
    }
}

pub(crate) fn expect_count(response: Response) -> ClientResult<u64> {
    match response {
        Response::Count(n) => Ok(n),
        _ => Err(ClientError::UnexpectedResponse { expected: "count" }),
    }
}

pub(crate) fn expect_text(response: Response) -> ClientResult<String> {
    match response {
        Response::Text(text) => Ok(text),
        _ => Err(ClientError::UnexpectedResponse { expected: "text" }),
    }
}
