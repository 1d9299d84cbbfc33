//! One-time console initialization
//!
//! Runs before the supervisor starts (typically `./startup.sh`, which brings
//! up adb over TCP and the port forwards the speed service needs). A failure
//! here is logged and startup continues: the supervisor's recovery loop is
//! the mechanism that repairs a device that did not come up.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::exec::{self, CommandSpec, Delivery};

/// Run the startup procedure and report how it went.
///
/// Returns `None` when the procedure could not be run at all.
pub async fn run_startup(command: &CommandSpec, timeout: Duration) -> Option<Delivery> {
    info!(command = %command, "Running startup procedure");

    match exec::run(command, timeout).await {
        Ok(delivery @ Delivery::Confirmed) => {
            info!("Startup procedure completed");
            Some(delivery)
        }
        Ok(delivery) => {
            warn!(outcome = %delivery, "Startup procedure exited abnormally, continuing");
            Some(delivery)
        }
        Err(e) => {
            error!(error = %e, "Startup procedure could not be run, continuing");
            None
        }
    }
}
