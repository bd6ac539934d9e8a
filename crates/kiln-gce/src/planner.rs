//! Step list assembly.
//!
//! The plan is a pure function of the template. The lifecycle order is
//! fixed; only image capture (skipped for dry runs) and the startup-script
//! wait (added when a startup script is declared) are optional.
//!
//! ```text
//! check_existing_image → create_ssh_key → create_instance
//!   → create_windows_password → instance_info → connect → provision
//!   → [wait_startup_script] → teardown_instance → [create_image]
//! ```
//!
//! The startup-script wait sits before teardown: it polls the instance,
//! which no longer exists once teardown has run.

use kiln_config::BuildConfig;
use kiln_engine::Step;

use crate::steps::{
    CheckExistingImage, Connect, CreateImage, CreateInstance, CreateSshKey,
    CreateWindowsPassword, InstanceInfo, Provision, TeardownInstance, WaitStartupScript,
};

/// Build the ordered step list for one run.
pub fn plan(config: &BuildConfig) -> Vec<Box<dyn Step>> {
    let mut steps: Vec<Box<dyn Step>> = vec![
        Box::new(CheckExistingImage),
        Box::new(CreateSshKey),
        Box::new(CreateInstance),
        Box::new(CreateWindowsPassword),
        Box::new(InstanceInfo),
        Box::new(Connect),
        Box::new(Provision),
    ];

    if config.has_startup_script() {
        steps.push(Box::new(WaitStartupScript));
    }
    steps.push(Box::new(TeardownInstance));
    if !config.dry_run {
        steps.push(Box::new(CreateImage));
    }

    tracing::debug!(
        steps = steps.len(),
        dry_run = config.dry_run,
        startup_script = config.has_startup_script(),
        "Planned build"
    );
    steps
}

/// Names of the steps [`plan`] would produce, in order.
pub fn plan_names(config: &BuildConfig) -> Vec<&'static str> {
    plan(config).iter().map(|s| s.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    const FIXED_PREFIX: [&str; 7] = [
        "check_existing_image",
        "create_ssh_key",
        "create_instance",
        "create_windows_password",
        "instance_info",
        "connect",
        "provision",
    ];

    fn count(names: &[&str], name: &str) -> usize {
        names.iter().filter(|n| **n == name).count()
    }

    #[test]
    fn test_dry_run_without_startup_script() {
        let mut config = BuildConfig::new();
        config.dry_run = true;
        let names = plan_names(&config);

        assert_eq!(names.len(), 8);
        assert_eq!(&names[..7], &FIXED_PREFIX);
        assert_eq!(names[7], "teardown_instance");
        assert_eq!(count(&names, "create_image"), 0);
        assert_eq!(count(&names, "wait_startup_script"), 0);
    }

    #[test]
    fn test_startup_script_wait_precedes_teardown_rather_than_following_capture() {
        let mut config = BuildConfig::new();
        config.startup_script_file = Some(PathBuf::from("startup.sh"));
        let names = plan_names(&config);

        assert_eq!(names.len(), 10);
        let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(position("wait_startup_script") < position("teardown_instance"));
        assert!(position("wait_startup_script") < position("create_image"));
        assert_eq!(&names[..7], &FIXED_PREFIX);
        assert_eq!(
            &names[7..],
            &["wait_startup_script", "teardown_instance", "create_image"]
        );
    }

    #[test]
    fn test_full_build_without_startup_script() {
        let names = plan_names(&BuildConfig::new());
        assert_eq!(names.len(), 9);
        assert_eq!(names.last(), Some(&"create_image"));
    }

    #[test]
    fn test_metadata_startup_script_adds_one_wait() {
        let mut config = BuildConfig::new();
        config
            .metadata
            .insert(kiln_config::STARTUP_SCRIPT_KEY.into(), "echo".into());
        config.startup_script_file = Some(PathBuf::from("startup.sh"));
        let names = plan_names(&config);
        assert_eq!(count(&names, "wait_startup_script"), 1);
    }

    #[test]
    fn test_every_step_emitted_once() {
        for dry_run in [false, true] {
            for script in [false, true] {
                let mut config = BuildConfig::new();
                config.dry_run = dry_run;
                if script {
                    config.startup_script_file = Some(PathBuf::from("s.sh"));
                }
                let names = plan_names(&config);
                let unique: HashSet<_> = names.iter().collect();
                assert_eq!(unique.len(), names.len(), "{names:?}");
            }
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let config = BuildConfig::new();
        assert_eq!(plan_names(&config), plan_names(&config));
    }
}
