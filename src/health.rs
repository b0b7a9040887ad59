//! Health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? |
//! | **Readiness** | `/readyz` | Can uploads be stored right now? |

use crate::request::Request;
use crate::response::Response;
use crate::status::Status;
use crate::storage::TempStore;

/// Always `200 OK` with body `"ok"`.
pub async fn liveness(_req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with body `"ready"` while the temporary directory exists,
/// `503` once it has gone away (e.g. a tmp cleaner removed it).
pub fn readiness(store: &TempStore) -> Response {
    if store.is_ready() {
        Response::text("ready")
    } else {
        Response::builder().status(Status::ServiceUnavailable).text("temporary directory unavailable")
    }
}
