use crate::ballots::{BallotBook, Stake};
use chrono::{DateTime, Utc};
use kit::{
    DispatchOutcome, FrameworkError, HttpResponse, MicroserviceDispatcher, Principal, Request,
    Response, ServiceMessage,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct OpenBallot {
    pub title: String,
    pub options: Vec<String>,
    pub closes_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct PlaceStake {
    pub option: String,
    pub amount: u64,
}

fn principal(req: &Request) -> Result<&Principal, FrameworkError> {
    req.get::<Principal>()
        .ok_or_else(|| FrameworkError::unauthenticated("No authenticated principal"))
}

pub async fn config(book: Arc<BallotBook>, _req: Request) -> Response {
    let config = serde_json::to_value(book.config()).map_err(|e| FrameworkError::internal(e.to_string()))?;
    Ok(HttpResponse::json(config))
}

pub async fn show(book: Arc<BallotBook>, req: Request) -> Response {
    let ballot = book.get(req.param_as("id")?)?;
    Ok(HttpResponse::json(json!({
        "ballot": ballot,
        "totals": ballot.totals(),
    })))
}

pub async fn store(book: Arc<BallotBook>, req: Request) -> Response {
    let input: OpenBallot = req.json()?;
    let ballot = book.open(input.title, input.options, input.closes_at)?;
    tracing::info!(ballot = ballot.id, by = %principal(&req)?.id, "ballot opened");
    Ok(HttpResponse::json(json!({ "ballot": ballot })).status(201))
}

pub async fn stake(book: Arc<BallotBook>, req: Request) -> Response {
    let input: PlaceStake = req.json()?;
    let stake = Stake {
        user: principal(&req)?.id.clone(),
        option: input.option,
        amount: input.amount,
    };
    let ballot = book.stake(req.param_as("id")?, stake, Utc::now())?;
    Ok(HttpResponse::json(json!({ "totals": ballot.totals() })))
}

/// Close a ballot and hand the totals to the ledger service for settlement
pub async fn close(
    book: Arc<BallotBook>,
    dispatcher: Arc<dyn MicroserviceDispatcher>,
    req: Request,
) -> Response {
    let closed_by = principal(&req)?.id.clone();
    let ballot = book.close(req.param_as("id")?)?;
    let message = ServiceMessage::new(
        "ledger",
        "/settlements",
        json!({
            "ballot": ballot.id,
            "currency": book.config().currency,
            "totals": ballot.totals(),
        }),
    )
    .header("x-closed-by", closed_by);

    let outcome = match dispatcher.dispatch(message).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(ballot = ballot.id, error = %e, "settlement failed, ballot reopened");
            book.reopen(ballot.id);
            return Err(e.into());
        }
    };
    match outcome {
        DispatchOutcome::Delivered { status, body } => Ok(HttpResponse::json(json!({
            "ballot": ballot.id,
            "settlement": { "status": status, "body": body },
        }))),
        DispatchOutcome::Queued { id } => Ok(HttpResponse::json(json!({
            "ballot": ballot.id,
            "settlement": { "queued": id },
        }))
        .status(202)),
    }
}
