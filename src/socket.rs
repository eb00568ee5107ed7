//! # Summary
//!
//! This module abstracts over external connections to clients and peer
//! replicas.
//!
//! Uses `bincode` inside `tokio-util`'s length-delimited codec, wrapped
//! around tokio's asynchronous TCP stream. This lets us send and receive
//! Rust structs through a TCP connection with minimal boilerplate on the
//! sending and receiving ends.

use std::marker::PhantomData;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::error::Error;

/// External receiving channel. Expects length-delimited, bincode-encoded
/// Rust data of type `R` sent via TCP.
pub struct Rx<R> {
    inner: FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    _marker: PhantomData<R>,
}

/// External transmission channel. Sends length-delimited, bincode-encoded
/// Rust data of type `T` over TCP.
pub struct Tx<T> {
    inner: FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>,
    _marker: PhantomData<T>,
}

/// Splits a `TcpStream` into a pair of receiving and transmitting channels
/// capable of reading and writing bincode-encoded data.
pub fn split<R, T>(stream: TcpStream) -> (Rx<R>, Tx<T>)
where R: serde::de::DeserializeOwned,
      T: serde::Serialize,
{
    let (rx, tx) = stream.into_split();
    let rx = FramedRead::new(rx, LengthDelimitedCodec::new());
    let tx = FramedWrite::new(tx, LengthDelimitedCodec::new());
    (
        Rx { inner: rx, _marker: PhantomData },
        Tx { inner: tx, _marker: PhantomData },
    )
}

impl<R: serde::de::DeserializeOwned> Rx<R> {
    /// Receives the next frame, or None once the connection is closed.
    pub async fn recv(&mut self) -> Option<Result<R, Error>> {
        match self.inner.next().await? {
        | Ok(frame) => Some(bincode::deserialize(&frame).map_err(Error::from)),
        | Err(error) => Some(Err(Error::from(error))),
        }
    }
}

impl<T: serde::Serialize> Tx<T> {
    /// Encodes and sends one frame.
    pub async fn send(&mut self, item: &T) -> Result<(), Error> {
        let frame = bincode::serialize(item)?;
        self.inner.send(frame.into()).await?;
        Ok(())
    }
}
