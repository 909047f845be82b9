//! Resource attribute assembly.
//!
//! Probes run in a fixed order and later keys override earlier ones:
//! SDK identity, environment, process, OS, container, host.
//!
//! Process command-line arguments are never recorded: they may carry
//! credentials such as database passwords.

use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::resource::{ResourceDetector, TelemetryResourceDetector};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{
    CONTAINER_ID, HOST_NAME, OS_DESCRIPTION, OS_TYPE, PROCESS_EXECUTABLE_NAME,
    PROCESS_EXECUTABLE_PATH, PROCESS_OWNER, PROCESS_PID, PROCESS_RUNTIME_DESCRIPTION,
    PROCESS_RUNTIME_NAME, PROCESS_RUNTIME_VERSION, SERVICE_NAME,
};
use std::path::Path;

use crate::config::{ResourceConfig, ENV_RESOURCE_ATTRIBUTES};
use crate::error::TelemetryError;

const CGROUP_PATH: &str = "/proc/self/cgroup";
const CONTAINER_ID_LEN: usize = 64;

/// Build the process-wide resource.
///
/// Fails if a required probe fails, for example when
/// `OTEL_RESOURCE_ATTRIBUTES` is malformed or the host name cannot be read.
/// Best-effort probes (owner, OS description, container) are left out
/// silently when they find nothing.
pub fn build_resource(config: &ResourceConfig) -> Result<Resource, TelemetryError> {
    let mut attributes = sdk_attributes();

    let process = process_attributes()?;
    let executable_name = process
        .iter()
        .find(|kv| kv.key.as_str() == PROCESS_EXECUTABLE_NAME)
        .map(|kv| kv.value.as_str().into_owned());

    attributes.extend(env_attributes(config, executable_name.as_deref())?);
    attributes.extend(process);
    attributes.extend(os_attributes());
    attributes.extend(container_attributes(Path::new(CGROUP_PATH)));
    attributes.push(KeyValue::new(HOST_NAME, host_name()?));

    let resource = Resource::builder_empty().with_attributes(attributes).build();
    tracing::debug!(attributes = resource.len(), "Resource built");
    Ok(resource)
}

/// Look up a single attribute value by key.
pub fn resource_value(resource: &Resource, key: &str) -> Option<Value> {
    resource
        .iter()
        .find(|(k, _)| k.as_str() == key)
        .map(|(_, v)| v.clone())
}

fn sdk_attributes() -> Vec<KeyValue> {
    TelemetryResourceDetector
        .detect()
        .iter()
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
        .collect()
}

/// `OTEL_RESOURCE_ATTRIBUTES` followed by `OTEL_SERVICE_NAME`.
fn env_attributes(
    config: &ResourceConfig,
    executable_name: Option<&str>,
) -> Result<Vec<KeyValue>, TelemetryError> {
    let mut attributes = match config.attributes.as_deref() {
        Some(raw) => parse_resource_attributes(raw)?,
        None => Vec::new(),
    };

    let service_name = config
        .service_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    if let Some(name) = service_name {
        attributes.retain(|kv| kv.key.as_str() != SERVICE_NAME);
        attributes.push(KeyValue::new(SERVICE_NAME, name.to_string()));
    } else if !attributes.iter().any(|kv| kv.key.as_str() == SERVICE_NAME) {
        let fallback = match executable_name {
            Some(exe) => format!("unknown_service:{exe}"),
            None => "unknown_service".to_string(),
        };
        attributes.push(KeyValue::new(SERVICE_NAME, fallback));
    }

    Ok(attributes)
}

/// Parse `key1=value1,key2=value2`, percent-decoding values.
pub fn parse_resource_attributes(raw: &str) -> Result<Vec<KeyValue>, TelemetryError> {
    let mut attributes = Vec::new();

    for entry in raw.split(',') {
        if entry.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = entry.split_once('=') else {
            return Err(TelemetryError::Resource(format!(
                "{ENV_RESOURCE_ATTRIBUTES}: missing value in {:?}",
                entry.trim()
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(TelemetryError::Resource(format!(
                "{ENV_RESOURCE_ATTRIBUTES}: missing key in {:?}",
                entry.trim()
            )));
        }
        let value = percent_decode(value.trim()).map_err(|reason| {
            TelemetryError::Resource(format!(
                "{ENV_RESOURCE_ATTRIBUTES}: invalid value for {key:?}: {reason}"
            ))
        })?;
        attributes.push(KeyValue::new(key.to_string(), value));
    }

    Ok(attributes)
}

fn percent_decode(input: &str) -> Result<String, String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("bad escape at byte {i}"))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).map_err(|e| e.to_string())
}

fn process_attributes() -> Result<Vec<KeyValue>, TelemetryError> {
    let exe = std::env::current_exe()
        .map_err(|e| TelemetryError::Resource(format!("executable path: {e}")))?;
    let exe_name = exe
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut attributes = vec![
        KeyValue::new(PROCESS_PID, i64::from(std::process::id())),
        KeyValue::new(PROCESS_EXECUTABLE_NAME, exe_name),
        KeyValue::new(PROCESS_EXECUTABLE_PATH, exe.to_string_lossy().into_owned()),
    ];

    match process_owner() {
        Some(owner) => attributes.push(KeyValue::new(PROCESS_OWNER, owner)),
        None => tracing::debug!("Process owner unavailable, skipping"),
    }

    attributes.push(KeyValue::new(PROCESS_RUNTIME_NAME, "rustc"));
    if let Some(version) = option_env!("OTELBOOT_RUSTC_VERSION") {
        attributes.push(KeyValue::new(PROCESS_RUNTIME_VERSION, version));
    }
    if let Some(description) = option_env!("OTELBOOT_RUSTC_DESCRIPTION") {
        attributes.push(KeyValue::new(PROCESS_RUNTIME_DESCRIPTION, description));
    }

    Ok(attributes)
}

/// Name of the user the process runs as, looked up from the real uid.
#[cfg(unix)]
fn process_owner() -> Option<String> {
    match nix::unistd::User::from_uid(nix::unistd::getuid()) {
        Ok(user) => user.map(|user| user.name),
        Err(e) => {
            tracing::debug!(error = %e, "User lookup failed");
            None
        }
    }
}

#[cfg(not(unix))]
fn process_owner() -> Option<String> {
    std::env::var("USERNAME")
        .ok()
        .map(|owner| owner.trim().to_string())
        .filter(|owner| !owner.is_empty())
}

fn os_attributes() -> Vec<KeyValue> {
    let mut attributes = vec![KeyValue::new(OS_TYPE, std::env::consts::OS)];
    match os_description() {
        Some(description) => attributes.push(KeyValue::new(OS_DESCRIPTION, description)),
        None => tracing::debug!("OS description unavailable, skipping"),
    }
    attributes
}

fn os_description() -> Option<String> {
    let read = |name: &str| {
        std::fs::read_to_string(Path::new("/proc/sys/kernel").join(name))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let os_type = read("ostype")?;
    let release = read("osrelease")?;
    Some(match read("version") {
        Some(version) => format!("{os_type} {release} {version}"),
        None => format!("{os_type} {release}"),
    })
}

/// Best effort: absent when not containerised or `/proc` is unreadable.
fn container_attributes(cgroup_path: &Path) -> Vec<KeyValue> {
    match std::fs::read_to_string(cgroup_path) {
        Ok(contents) => container_id_from_cgroup(&contents)
            .map(|id| vec![KeyValue::new(CONTAINER_ID, id)])
            .unwrap_or_default(),
        Err(e) => {
            tracing::debug!(
                path = %cgroup_path.display(),
                error = %e,
                "No cgroup info, skipping container detection"
            );
            Vec::new()
        }
    }
}

/// Extract a 64-hex-digit container id from `/proc/self/cgroup` contents.
///
/// Handles plain docker paths (`/docker/<id>`) as well as systemd scopes
/// (`/system.slice/docker-<id>.scope`, `cri-containerd-<id>.scope`).
pub fn container_id_from_cgroup(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let segment = line.trim().rsplit('/').next()?;
        let segment = segment.strip_suffix(".scope").unwrap_or(segment);
        let candidate = segment.rsplit(['-', ':']).next()?;
        (candidate.len() == CONTAINER_ID_LEN && candidate.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| candidate.to_string())
    })
}

fn host_name() -> Result<String, TelemetryError> {
    hostname::get()
        .map_err(|e| TelemetryError::Resource(format!("host name: {e}")))?
        .into_string()
        .map_err(|raw| TelemetryError::Resource(format!("host name is not UTF-8: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_semantic_conventions::resource::{TELEMETRY_SDK_LANGUAGE, TELEMETRY_SDK_NAME};

    fn value_of(resource: &Resource, key: &str) -> Option<String> {
        resource_value(resource, key).map(|v| v.as_str().into_owned())
    }

    #[test]
    fn test_service_name_override_wins() {
        let config = ResourceConfig {
            service_name: Some(" myservice ".into()),
            attributes: Some("service.name=other,deployment.environment=prod".into()),
        };
        let resource = build_resource(&config).unwrap();

        assert_eq!(value_of(&resource, SERVICE_NAME).as_deref(), Some("myservice"));
        assert_eq!(
            value_of(&resource, "deployment.environment").as_deref(),
            Some("prod")
        );
    }

    #[test]
    fn test_service_name_from_attributes() {
        let config = ResourceConfig {
            service_name: None,
            attributes: Some("service.name=from-attrs".into()),
        };
        let resource = build_resource(&config).unwrap();
        assert_eq!(value_of(&resource, SERVICE_NAME).as_deref(), Some("from-attrs"));
    }

    #[test]
    fn test_default_service_name_uses_executable() {
        let resource = build_resource(&ResourceConfig::default()).unwrap();
        let name = value_of(&resource, SERVICE_NAME).unwrap();
        assert!(name.starts_with("unknown_service"), "got {name}");
    }

    #[test]
    fn test_process_and_host_facts_present() {
        let resource = build_resource(&ResourceConfig::default()).unwrap();

        for key in [
            TELEMETRY_SDK_NAME,
            TELEMETRY_SDK_LANGUAGE,
            PROCESS_PID,
            PROCESS_EXECUTABLE_NAME,
            PROCESS_EXECUTABLE_PATH,
            PROCESS_RUNTIME_NAME,
            OS_TYPE,
            HOST_NAME,
        ] {
            assert!(resource_value(&resource, key).is_some(), "missing {key}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_host_name_matches_kernel() {
        let resource = build_resource(&ResourceConfig::default()).unwrap();
        let expected = nix::unistd::gethostname()
            .unwrap()
            .into_string()
            .unwrap();
        assert_eq!(value_of(&resource, HOST_NAME), Some(expected));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_owner_is_real_user() {
        let expected = nix::unistd::User::from_uid(nix::unistd::getuid())
            .unwrap()
            .map(|user| user.name);
        let resource = build_resource(&ResourceConfig::default()).unwrap();
        assert_eq!(value_of(&resource, PROCESS_OWNER), expected);
    }

    #[test]
    fn test_command_args_never_recorded() {
        let resource = build_resource(&ResourceConfig::default()).unwrap();
        assert!(resource_value(&resource, "process.command_args").is_none());
        assert!(resource_value(&resource, "process.command_line").is_none());
        assert!(resource_value(&resource, "process.command").is_none());
    }

    #[test]
    fn test_malformed_attributes_fail() {
        let config = ResourceConfig {
            service_name: None,
            attributes: Some("novalue".into()),
        };
        assert!(matches!(
            build_resource(&config),
            Err(TelemetryError::Resource(_))
        ));
    }

    #[test]
    fn test_parse_attributes_decodes_and_trims() {
        let attrs =
            parse_resource_attributes(" team = core%20infra ,, region=eu%2Dwest ").unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].key.as_str(), "team");
        assert_eq!(attrs[0].value.as_str(), "core infra");
        assert_eq!(attrs[1].value.as_str(), "eu-west");
    }

    #[test]
    fn test_parse_attributes_rejects_bad_escape() {
        assert!(parse_resource_attributes("k=%zz").is_err());
        assert!(parse_resource_attributes("k=%4").is_err());
        assert!(parse_resource_attributes("=v").is_err());
    }

    #[test]
    fn test_container_id_docker_v1() {
        let id = "a".repeat(64);
        let contents = format!("12:cpuset:/docker/{id}\n11:memory:/docker/{id}\n");
        assert_eq!(container_id_from_cgroup(&contents), Some(id));
    }

    #[test]
    fn test_container_id_systemd_scope() {
        let id = "0123456789abcdef".repeat(4);
        let contents = format!("0::/system.slice/docker-{id}.scope\n");
        assert_eq!(container_id_from_cgroup(&contents), Some(id));
    }

    #[test]
    fn test_no_container_id_on_host() {
        assert_eq!(container_id_from_cgroup("0::/user.slice/user-1000.slice\n"), None);
    }

    #[test]
    fn test_missing_cgroup_file_is_silent() {
        let attrs = container_attributes(Path::new("/nonexistent/cgroup"));
        assert!(attrs.is_empty());
    }
}
