// src/main.rs
//
// Sanity run: one rising effect on the right arm, computed at irregular
// frame intervals (including a dropped stretch) until it finishes.

use somatic::{Endpoint, EngineConfig, Group, HapticEngine, Side, Target};

const RISING: &str = r#"{
    "amplitude": [[0.0, 0.0], [2.0, 1.0]],
    "pitch": [[0.0, 0.0], [2.0, 1.0]],
    "pitch_range": [60.0, 250.0],
    "transients": [[1.5, 1.0, 120.0]]
}"#;

fn main() {
    let engine = HapticEngine::new(EngineConfig::default());
    engine.init();

    // --------------------------------
    // Material + source
    // --------------------------------

    let id = match engine.add_material(RISING) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Failed to add material: {e}");
            return;
        }
    };

    engine.play(id, 0.0, 0.0, 0.0);
    engine.add_targets(id, &[Target::plus(Group::Arm, Side::Right)]);

    // --------------------------------
    // Run a few frames
    // --------------------------------

    println!("Starting engine sanity test…");

    let arm = Endpoint::new(Group::Arm, Side::Right);
    // 1.0 -> 1.9 skips the transient at 1.5; it must still show up
    for time in [0.5, 1.0, 1.9, 2.5, 3.0] {
        engine.compute_all_events(time);
        let frame = engine.latest_frame();

        println!(
            "--- t = {:.2}s ({} samples, {} endpoint(s)) ---",
            time,
            frame.samples,
            frame.len()
        );
        println!(
            "peak {:.3}, transients {}, state {:?}",
            frame.peak(&arm),
            frame.transient_count(),
            engine.source_state(id)
        );
    }

    println!("Sanity test completed.");
}
