//! Print the custom resource definitions

use anyhow::{Context, Result};
use kube::CustomResourceExt;
use scheduler_lib::{Schedule, WorkloadSchedule};

/// Both CRDs as one multi-document YAML stream
pub fn render() -> Result<String> {
    let schedule = serde_yaml::to_string(&Schedule::crd()).context("Failed to render Schedule CRD")?;
    let workload_schedule = serde_yaml::to_string(&WorkloadSchedule::crd())
        .context("Failed to render WorkloadSchedule CRD")?;
    Ok(format!("---\n{}---\n{}", schedule, workload_schedule))
}

pub fn print_crds() -> Result<()> {
    print!("{}", render()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_both_definitions() {
        let yaml = render().unwrap();

        assert_eq!(yaml.matches("kind: CustomResourceDefinition").count(), 2);
        assert!(yaml.contains("name: schedules.workload-scheduler.bennsimon.github.io"));
        assert!(yaml.contains("name: workloadschedules.workload-scheduler.bennsimon.github.io"));
        assert!(yaml.contains("scope: Cluster"));
        assert!(yaml.contains("scheduleUnits"));
    }
}
