//! Integration tests for configuration files driving a session

use callroute_core::domain::{
    CallRouteConfig, Capabilities, ConfigManager, DeviceKind, RouteEngine, SessionController,
    SpeakerphoneBehavior,
};
use callroute_infra::platform::{SimulatedHeadset, SimulatedPlatform};
use tempfile::TempDir;

fn session(config: &CallRouteConfig) -> SessionController {
    let capabilities = config.capabilities.resolve(&Capabilities::PHONE);
    let engine = RouteEngine::new(
        config,
        capabilities,
        Box::new(SimulatedPlatform::new()),
        Box::new(SimulatedHeadset::new(&config.bluetooth)),
    );
    SessionController::new(engine)
}

#[tokio::test]
async fn test_saved_config_drives_selection() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(dir.path().to_path_buf());

    let mut config = CallRouteConfig::default();
    config.routing.speakerphone = SpeakerphoneBehavior::Always;
    manager.save(&config).await.unwrap();

    let loaded = manager.load().await;
    let mut session = session(&loaded);
    session.start().unwrap();

    assert_eq!(
        session.selected_device().map(|d| d.kind),
        Some(DeviceKind::Speakerphone)
    );
}

#[tokio::test]
async fn test_capability_override_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tablet.toml");
    tokio::fs::write(&path, "[capabilities]\nearpiece = false\n")
        .await
        .unwrap();

    let config = CallRouteConfig::load_from_file(&path).await.unwrap();
    let mut session = session(&config);
    session.start().unwrap();

    let kinds: Vec<_> = session.available_devices().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DeviceKind::Speakerphone]);
}

#[tokio::test]
async fn test_corrupt_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(dir.path().to_path_buf());
    tokio::fs::write(manager.config_path(), "routing = [")
        .await
        .unwrap();

    let config = manager.load().await;
    let mut session = session(&config);
    session.start().unwrap();

    assert_eq!(
        session.selected_device().map(|d| d.kind),
        Some(DeviceKind::Earpiece)
    );
    assert!(dir.path().join("config.toml.corrupt").exists());
}
