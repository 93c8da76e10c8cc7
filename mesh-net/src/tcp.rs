//! TCP-backed [`Transport`], with one multiplexed sub-stream per [`Channel`].
//!
//! Mirrors the connect-everyone-to-everyone dance of a typical multi-party network harness: each
//! rank listens, then ranks with a lower id accept inbound connections while ranks with a higher
//! id dial out, so every unordered pair connects exactly once.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_smux::MuxBuilder;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, trace};
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{Channel, MeshNetError, Transport, CHANNEL_COUNT};

type WrappedStream = Framed<async_smux::MuxStream<TcpStream>, LengthDelimitedCodec>;

fn wrap_stream(stream: async_smux::MuxStream<TcpStream>) -> WrappedStream {
    LengthDelimitedCodec::builder()
        .big_endian()
        .length_field_type::<u32>()
        .new_framed(stream)
}

pub struct TcpPeer {
    pub rank: u32,
    pub listen_addr: SocketAddr,
    streams: Option<Vec<AsyncMutex<WrappedStream>>>,
}

impl Debug for TcpPeer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpPeer")
            .field("rank", &self.rank)
            .field("listen_addr", &self.listen_addr)
            .field("connected", &self.streams.is_some())
            .finish()
    }
}

impl Clone for TcpPeer {
    fn clone(&self) -> Self {
        Self {
            rank: self.rank,
            listen_addr: self.listen_addr,
            streams: None,
        }
    }
}

async fn multiplex(
    is_server: bool,
    stream: TcpStream,
) -> Result<Vec<AsyncMutex<WrappedStream>>, MeshNetError> {
    if is_server {
        let (_connector, mut acceptor, worker) = MuxBuilder::server().with_connection(stream).build();
        tokio::spawn(worker);
        let mut ret = Vec::with_capacity(CHANNEL_COUNT);
        for _ in 0..CHANNEL_COUNT {
            let s = acceptor
                .accept()
                .await
                .ok_or_else(|| MeshNetError::Generic("mux accept failed".into()))?;
            ret.push(AsyncMutex::new(wrap_stream(s)));
        }
        Ok(ret)
    } else {
        let (connector, _acceptor, worker) = MuxBuilder::client().with_connection(stream).build();
        tokio::spawn(worker);
        let mut ret = Vec::with_capacity(CHANNEL_COUNT);
        for _ in 0..CHANNEL_COUNT {
            ret.push(AsyncMutex::new(wrap_stream(connector.connect()?)));
        }
        Ok(ret)
    }
}

/// A rank's live connections to every other rank in the process group.
pub struct TcpMesh {
    id: u32,
    n_parties: usize,
    listener: Option<TcpListener>,
    peers: HashMap<u32, TcpPeer>,
    sent: AtomicUsize,
    received: AtomicUsize,
}

impl TcpMesh {
    /// Build an unconnected mesh from a list of listen addresses, ordered by rank.
    pub fn from_addresses(id: u32, addresses: &[SocketAddr]) -> Self {
        let mut peers = HashMap::new();
        for (rank, addr) in addresses.iter().enumerate() {
            peers.insert(
                rank as u32,
                TcpPeer {
                    rank: rank as u32,
                    listen_addr: *addr,
                    streams: None,
                },
            );
        }
        Self {
            id,
            n_parties: addresses.len(),
            listener: None,
            peers,
            sent: AtomicUsize::new(0),
            received: AtomicUsize::new(0),
        }
    }

    pub async fn listen(&mut self) -> Result<(), MeshNetError> {
        let addr = self.peers.get(&self.id).expect("own rank must be in peer table").listen_addr;
        debug!("rank {} listening on {addr}", self.id);
        self.listener = Some(TcpListener::bind(addr).await?);
        Ok(())
    }

    /// Splice in a listener that was bound ahead of time (the [`crate::local`] harness needs to
    /// know every rank's ephemeral port before any rank starts dialing out).
    pub(crate) fn set_listener(&mut self, listener: TcpListener) {
        self.listener = Some(listener);
    }

    /// Connect to every other rank. Lower ranks accept `rank` inbound connections, higher ranks
    /// dial the peers below them, so exactly one TCP connection is made per unordered pair.
    pub async fn connect_all(&mut self) -> Result<(), MeshNetError> {
        let my_id = self.id;
        let n = self.n_parties;
        let inbound = my_id as usize;
        let outbound = n - 1 - my_id as usize;

        let listener = self.listener.take().ok_or(MeshNetError::NotConnected)?;
        let peer_addrs: HashMap<u32, SocketAddr> =
            self.peers.iter().map(|(r, p)| (*r, p.listen_addr)).collect();

        let accepted = SyncMutex::new(HashMap::new());
        let server = async {
            for _ in 0..inbound {
                let (mut stream, _) = listener.accept().await?;
                let peer_rank = stream.read_u32().await?;
                let muxed = multiplex(true, stream).await?;
                accepted.lock().insert(peer_rank, muxed);
                trace!("rank {my_id} accepted connection from {peer_rank}");
            }
            Ok::<_, MeshNetError>(())
        };

        let dialed = SyncMutex::new(HashMap::new());
        let client = async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            for offset in 0..outbound {
                let target = my_id + offset as u32 + 1;
                let addr = peer_addrs[&target];
                let mut stream = dial_with_retries(addr).await?;
                stream.write_u32(my_id).await?;
                let muxed = multiplex(false, stream).await?;
                dialed.lock().insert(target, muxed);
                trace!("rank {my_id} dialed {target}");
            }
            Ok::<_, MeshNetError>(())
        };

        tokio::try_join!(server, client)?;

        let mut accepted = accepted.into_inner();
        let mut dialed = dialed.into_inner();
        for (rank, peer) in self.peers.iter_mut() {
            if *rank == my_id {
                continue;
            }
            peer.streams = accepted.remove(rank).or_else(|| dialed.remove(rank));
        }

        for (rank, peer) in &self.peers {
            if *rank != my_id && peer.streams.is_none() {
                return Err(MeshNetError::Generic(format!("no stream to peer {rank}")));
            }
        }
        Ok(())
    }
}

async fn dial_with_retries(addr: SocketAddr) -> Result<TcpStream, MeshNetError> {
    let mut last_err = None;
    for _ in 0..30 {
        match TcpStream::connect(addr).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
    }
    Err(MeshNetError::Generic(format!(
        "failed to connect to {addr}: {:?}",
        last_err
    )))
}

#[async_trait]
impl Transport for TcpMesh {
    fn n_parties(&self) -> usize {
        self.n_parties
    }

    fn party_id(&self) -> u32 {
        self.id
    }

    fn byte_counts(&self) -> (usize, usize) {
        (
            self.sent.load(Ordering::Relaxed),
            self.received.load(Ordering::Relaxed),
        )
    }

    fn add_byte_counts(&self, sent: usize, received: usize) {
        self.sent.fetch_add(sent, Ordering::Relaxed);
        self.received.fetch_add(received, Ordering::Relaxed);
    }

    async fn send_to(&self, rank: u32, bytes: Bytes, ch: Channel) -> Result<(), MeshNetError> {
        let peer = self
            .peers
            .get(&rank)
            .ok_or(MeshNetError::UnknownRank { rank })?;
        let streams = peer.streams.as_ref().ok_or(MeshNetError::NotConnected)?;
        let len = bytes.len();
        streams[ch as usize].lock().await.send(bytes).await?;
        self.add_byte_counts(len, 0);
        Ok(())
    }

    async fn recv_from(&self, rank: u32, ch: Channel) -> Result<Bytes, MeshNetError> {
        let peer = self
            .peers
            .get(&rank)
            .ok_or(MeshNetError::UnknownRank { rank })?;
        let streams = peer.streams.as_ref().ok_or(MeshNetError::NotConnected)?;
        let frame = streams[ch as usize]
            .lock()
            .await
            .next()
            .await
            .ok_or(MeshNetError::PeerClosed { rank })??;
        let bytes = frame.freeze();
        self.add_byte_counts(0, bytes.len());
        Ok(bytes)
    }
}
