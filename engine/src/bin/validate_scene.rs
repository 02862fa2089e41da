//! Quick scene validation utility
//!
//! Resolves every entity's reference list against a scripts directory and
//! reports the issues found, without running any script.

use scriptset::core::entity::{EntityProperties, Name, World};
use scriptset::io::Scene;
use scriptset::scripting::{Readiness, ScriptLibrary, ScriptSetResolver};
use std::{env, path::Path, process::ExitCode};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let scene_path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("game/assets/scenes/demo.json");
    let scripts_dir = args
        .get(2)
        .map(String::as_str)
        .unwrap_or("game/assets/scripts");
    let key = args.get(3).map(String::as_str).unwrap_or("scripts");

    let path = Path::new(scene_path);
    println!("Validating scene: {}", path.display());

    let scene = match Scene::load_from_file(path) {
        Ok(scene) => scene,
        Err(e) => {
            eprintln!("✗ Failed to load scene: {e}");
            return ExitCode::FAILURE;
        }
    };
    let library = match ScriptLibrary::load_dir(Path::new(scripts_dir)) {
        Ok(library) => library,
        Err(e) => {
            eprintln!("✗ Failed to load scripts: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("✓ Scene loaded: {} entities", scene.entities.len());
    println!("✓ Scripts loaded: {}", library.len());

    let mut world = World::new();
    scene.instantiate(&mut world);

    let hosts: Vec<_> = world
        .query::<(&Name, &EntityProperties)>()
        .iter()
        .filter(|(_, (_, props))| props.contains(key))
        .map(|(entity, (name, _))| (entity, name.0.clone()))
        .collect();

    let mut issues = 0;
    for (entity, name) in hosts {
        let mut resolver = ScriptSetResolver::new(entity, key, Readiness::Ready);
        let ids = resolver
            .bind(&world, &library)
            .map(|changed| changed.new.ids().join(", "))
            .unwrap_or_default();
        println!("  {name}: [{ids}]");

        for issue in resolver.take_diagnostics() {
            println!("    ✗ {issue}");
            issues += 1;
        }
    }

    if issues == 0 {
        println!("✓ All references resolve");
        ExitCode::SUCCESS
    } else {
        eprintln!("✗ {issues} issue(s) found");
        ExitCode::FAILURE
    }
}
