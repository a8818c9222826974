//! What the daemon does with each inbound message.

use datt_content::ContentAuth;
use datt_messages::Message;
use datt_network::Inbound;
use datt_peers::ContentArchive;
use datt_types::Timestamp;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Log every inbound message; verify content auths and archive the valid ones.
pub async fn handle_inbound(
    mut rx: broadcast::Receiver<Inbound>,
    archive: Option<ContentArchive>,
) {
    loop {
        let inbound = match rx.recv().await {
            Ok(inbound) => inbound,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "inbound handler lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let peer = inbound.connection;

        match Message::from_msg(&inbound.msg) {
            Ok(Message::ContentAuth(m)) => {
                accept_content_auth(&peer.to_string(), m.into_content_auth(), archive.as_ref()).await
            }
            Ok(other) => debug!(%peer, cmd = other.cmd(), "message received"),
            Err(e) => warn!(%peer, error = %e, "undecodable message"),
        }
    }
}

async fn accept_content_auth(peer: &str, content_auth: ContentAuth, archive: Option<&ContentArchive>) {
    match content_auth.verify() {
        Ok(true) => {}
        Ok(false) => {
            warn!(%peer, address = %content_auth.address(), "content auth signature invalid");
            return;
        }
        Err(e) => {
            warn!(%peer, error = %e, "content auth malformed");
            return;
        }
    }
    info!(
        %peer,
        title = content_auth.title(),
        address = %content_auth.address(),
        height = content_auth.blockheight(),
        "verified content auth"
    );

    if let Some(archive) = archive {
        if let Err(e) = archive.record(&content_auth, Timestamp::now()).await {
            warn!(%peer, error = %e, "archiving content auth failed");
        }
    }
}
