use crate::ballots::BallotBook;
use crate::controllers::{ballots, health};
use kit::{ApplicationContext, FrameworkError, MicroserviceDispatcher, Router};

pub fn register(ctx: &ApplicationContext) -> Result<Router, FrameworkError> {
    let book = ctx.container().make::<BallotBook>()?;
    let dispatcher = ctx.container().make::<dyn MicroserviceDispatcher>()?;

    let (b1, b2, b3, b4, b5) = (book.clone(), book.clone(), book.clone(), book.clone(), book);

    Ok(Router::new()
        .get("/health", health::show)
        .name("health")
        .get("/vote/config", move |req| ballots::config(b1.clone(), req))
        .name("vote.config")
        .middleware("auth")
        .post("/ballots", move |req| ballots::store(b2.clone(), req))
        .name("ballots.store")
        .middleware("auth")
        .middleware("authorize:votes.open")
        .get("/ballots/{id}", move |req| ballots::show(b3.clone(), req))
        .name("ballots.show")
        .post("/ballots/{id}/stakes", move |req| ballots::stake(b4.clone(), req))
        .name("ballots.stake")
        .middleware("versioning")
        .middleware("auth")
        .post("/ballots/{id}/close", move |req| {
            ballots::close(b5.clone(), dispatcher.clone(), req)
        })
        .name("ballots.close")
        .middleware("auth")
        .middleware("authorize:votes.close")
        .into())
}
