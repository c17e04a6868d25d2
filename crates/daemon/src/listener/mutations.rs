// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-changing control-plane requests.

use pg_engine::StartOptions;

use super::ListenCtx;
use crate::protocol::{Request, Response};

pub(super) async fn handle(request: Request, ctx: &ListenCtx) -> Response {
    let result = match request {
        Request::AddProcess { config } => ctx.supervisor.register(config),
        Request::RemoveProcess { name } => ctx.supervisor.deregister(&name),
        Request::Start {
            name,
            ignore_dependencies,
        } => {
            ctx.supervisor
                .start(&name, StartOptions { ignore_dependencies })
                .await
        }
        Request::Stop { name } => ctx.supervisor.stop(&name).await,
        Request::Restart {
            name,
            ignore_dependencies,
        } => {
            ctx.supervisor
                .restart(&name, StartOptions { ignore_dependencies })
                .await
        }
        Request::ForceEnable { name } => ctx.supervisor.force_enable(&name).await,
        Request::ResetCrashes { name } => ctx.supervisor.reset_crashes(&name).await,
        Request::AcknowledgeAlert { id } => ctx.supervisor.alerts().acknowledge(&id),
        Request::ResolveAlert { id } => ctx.supervisor.alerts().resolve(&id),
        other => {
            return Response::error("invalid_request", format!("not a mutation: {other:?}"))
        }
    };

    match result {
        Ok(()) => Response::Ok,
        Err(e) => Response::from(&e),
    }
}
