//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::Path;

pub use spotinstall::testing::FakeRunner;
use spotinstall::{CommandOutput, ProvisionConfig};

/// Default configuration with every local path moved under `root`
pub fn config_in(root: &Path) -> ProvisionConfig {
    let mut config = ProvisionConfig::default();
    config.paths.temp_dir = root.join("tmp");
    config.paths.source_dir = root.join("tmp/spotifyd");
    config.paths.unit_destination = root.join("etc/systemd/system/spotifyd.service");
    config.paths.config_destination = root.join("etc/spotifyd.conf");
    config.paths.binary_destination = root.join("usr/local/bin/spotifyd");
    config.paths.hook_destination = root.join("usr/local/bin/spotifyd-event.sh");
    config.toolchain.installed_cargo = Some(root.join("home/.cargo/bin/cargo"));
    config.build.jobs = Some(2);
    config
}

/// dpkg-query answers: `installed` packages are present, all others unknown
pub fn with_packages(runner: FakeRunner, installed: Vec<String>) -> FakeRunner {
    runner
        .on(
            move |c| {
                c.program == "dpkg-query"
                    && c.args.last().is_some_and(|p| installed.contains(p))
            },
            CommandOutput::ok("install ok installed"),
        )
        .on(
            |c| c.program == "dpkg-query",
            CommandOutput::failed(1, "dpkg-query: no packages found matching"),
        )
}
