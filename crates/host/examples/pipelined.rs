//! Routes one pipelined batch through a network and prints what reaches the wire.
//!
//! The first request is answered slowly, yet its response still comes first.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, header};
use micro_host::{Controller, ControllerError, Host, Mount, Network, Partition};
use micro_transport::connection::pipeline;
use micro_transport::protocol::RequestHeader;
use micro_transport::protocol::body::ReqBody;
use tokio::io::AsyncReadExt;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

struct Slow(Mount);

impl Partition for Slow {
    fn mount(&self) -> &Mount {
        &self.0
    }

    fn select(&self, _host: &Arc<Host>, mut controller: Controller) -> Result<(), ControllerError> {
        controller.accept(None)?;
        let ticks = futures::StreamExt::then(futures::stream::iter(1..=3), |tick| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Bytes::from(format!("tick {tick}\n"))
        });
        controller.stream_output(Some(&mime::TEXT_PLAIN), None, ticks)
    }
}

struct Moved(Mount);

impl Partition for Moved {
    fn mount(&self) -> &Mount {
        &self.0
    }

    fn select(&self, _host: &Arc<Host>, mut controller: Controller) -> Result<(), ControllerError> {
        controller.redirect("/slow")
    }
}

fn request(method: Method, target: &str, connection: Option<&str>) -> RequestHeader {
    let mut builder = Request::builder().method(method).uri(target).header(header::HOST, "example.org");
    if let Some(connection) = connection {
        builder = builder.header(header::CONNECTION, connection);
    }
    match builder.body(()) {
        Ok(request) => request.into(),
        Err(e) => panic!("invalid request {target}: {e}"),
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = Host::builder()
        .names(["example.org", "www.example.org"])
        .partition(Slow(Mount::new("/slow")))
        .partition(Moved(Mount::new("/old")))
        .build();
    let host = match host {
        Ok(host) => Arc::new(host),
        Err(e) => {
            error!(cause = %e, "invalid host configuration");
            return;
        }
    };

    let network = match Network::builder().default_host("example.org").host(&host).build() {
        Ok(network) => network,
        Err(e) => {
            error!(cause = %e, "invalid network configuration");
            return;
        }
    };

    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let (mut pipeliner, catenation) = pipeline();
    let writer = tokio::spawn(catenation.run(server));

    let batch = pipeliner.admit_all([
        (request(Method::GET, "/slow", None), ReqBody::empty()),
        (request(Method::GET, "/old", None), ReqBody::empty()),
        (request(Method::OPTIONS, "*", None), ReqBody::empty()),
        (request(Method::GET, "/missing", Some("close")), ReqBody::empty()),
    ]);
    drop(pipeliner);

    if let Err(e) = network.accept(batch) {
        error!(cause = %e, "no host for connection");
        return;
    }

    let mut wire = String::new();
    if let Err(e) = client.read_to_string(&mut wire).await {
        error!(cause = %e, "failed to read responses");
    }
    match writer.await {
        Ok(Ok(())) => info!("connection closed"),
        Ok(Err(e)) => error!(cause = %e, "connection failed"),
        Err(e) => error!(cause = %e, "connection task failed"),
    }

    println!("{wire}");
    network.terminate().await;
}
