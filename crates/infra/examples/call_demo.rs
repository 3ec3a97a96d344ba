//! Example walking one call through headset changes
//!
//! Run with: cargo run --package callroute-infra --example call_demo

use callroute_core::domain::{
    route_callback, CallRouteConfig, Capabilities, RouteEngine, SessionController,
};
use callroute_infra::platform::{SignalQueue, SimulatedHeadset, SimulatedPlatform};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("callroute_core=debug,info")
        .init();

    println!("=== Call Route Demo ===\n");

    let config = CallRouteConfig::default();
    let queue = SignalQueue::with_capacity(config.engine.signal_queue_capacity);
    let platform = SimulatedPlatform::new().with_signals(queue.sender());
    let headset = SimulatedHeadset::new(&config.bluetooth).with_signals(queue.sender());

    let engine = RouteEngine::new(
        &config,
        Capabilities::PHONE,
        Box::new(platform.clone()),
        Box::new(headset.clone()),
    );
    let mut session = SessionController::new(engine);
    session.set_route_callback(route_callback(|change| {
        let labels: Vec<&str> = change.available.iter().map(|d| d.label.as_str()).collect();
        match &change.selected {
            Some(device) => println!("   -> {} [{}]", device, labels.join(", ")),
            None => println!("   -> none [{}]", labels.join(", ")),
        }
    }));

    println!("1. Starting and activating the call...");
    session.start()?;
    session.activate()?;

    println!("\n2. Plugging in a wired headset...");
    platform.plug_headset(true);
    queue.pump(&mut session);

    println!("\n3. Connecting a Bluetooth headset...");
    headset.pair("Car Kit");
    queue.pump(&mut session);
    headset.sco_connected();
    queue.pump(&mut session);

    println!("\n4. Disconnecting the Bluetooth headset...");
    headset.unpair();
    queue.pump(&mut session);

    println!("\n5. Ending the call...");
    session.deactivate()?;
    session.stop()?;

    println!("\n=== Demo Complete ===");
    Ok(())
}
