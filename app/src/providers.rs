use crate::ballots::BallotBook;
use kit::config::VoteConfig;
use kit::{ApplicationContext, FrameworkError, ServiceProvider};
use std::sync::Arc;

/// Binds the ballot book, configured from the `vote` namespace
#[derive(Default)]
pub struct VoteServiceProvider;

impl ServiceProvider for VoteServiceProvider {
    fn name(&self) -> &'static str {
        "VoteServiceProvider"
    }

    fn register(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
        let config: VoteConfig = ctx.section("vote")?;
        if !config.enabled {
            tracing::warn!("voting is disabled, every stake will be rejected");
        }
        ctx.container_mut()
            .singleton::<BallotBook, _>(move |_, _| Ok(Arc::new(BallotBook::new(config.clone()))));
        Ok(())
    }
}

kit::submit_provider!(VoteServiceProvider);

#[cfg(test)]
mod tests {
    use super::*;
    use kit::container::provider::discovered;

    #[test]
    fn is_discoverable() {
        let names: Vec<_> = discovered().iter().map(|p| p.name()).collect();
        assert!(names.contains(&"VoteServiceProvider"));
    }
}
