use super::{DockerExecutor, Executor, NativeExecutor};
use crate::model::Rule;
use crate::Config;
use std::sync::Arc;

/// Picks the executor a rule runs with. The scheduler only ever talks to a selector, never to a
/// concrete executor.
///
pub trait ExecutorSelector: Send + Sync {
    fn select(&self, rule: &Rule) -> Arc<dyn Executor>;
}

/// Runs rules that declare an image in a container when containers are enabled, and everything
/// else natively.
///
#[derive(Clone)]
pub struct DefaultExecutorSelector {
    native: Arc<dyn Executor>,
    docker: Option<Arc<dyn Executor>>,
}

impl DefaultExecutorSelector {
    pub fn new(config: &Config) -> Self {
        let docker: Option<Arc<dyn Executor>> = if config.use_docker() {
            Some(Arc::new(DockerExecutor::new(config.docker_bin())))
        } else {
            None
        };
        Self {
            native: Arc::new(NativeExecutor::new(config.shell())),
            docker,
        }
    }

    pub fn with_executors(native: Arc<dyn Executor>, docker: Option<Arc<dyn Executor>>) -> Self {
        Self { native, docker }
    }
}

impl ExecutorSelector for DefaultExecutorSelector {
    fn select(&self, rule: &Rule) -> Arc<dyn Executor> {
        match (&self.docker, rule.image()) {
            (Some(docker), Some(_)) => docker.clone(),
            _ => self.native.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, RuleId};

    fn rule(image: Option<&str>) -> Rule {
        let component = Arc::new(
            Component::builder()
                .name("api")
                .root("/repo/api")
                .build()
                .unwrap(),
        );
        Rule::builder()
            .id(RuleId::new("api", "build"))
            .component(component)
            .command("true")
            .image(image.map(String::from))
            .build()
            .unwrap()
    }

    #[test]
    fn containers_are_used_only_when_enabled_and_declared() {
        let enabled = DefaultExecutorSelector::new(&Config::builder().use_docker(true).build().unwrap());
        assert!(enabled.select(&rule(Some("alpine"))).uses_docker());
        assert!(!enabled.select(&rule(None)).uses_docker());

        let disabled = DefaultExecutorSelector::new(&Config::builder().build().unwrap());
        assert!(!disabled.select(&rule(Some("alpine"))).uses_docker());
    }
}
