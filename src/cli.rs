//! Terminal output for the replay binary

use anyhow::Result;
use colored::*;
use scopemux::replay::{builtin, Snapshot};
use scopemux::ScopedStore;

pub fn print_builtins() {
    println!("{}", "Built-in transitions:".bold());
    for name in builtin::NAMES {
        println!("  {}", name.cyan());
    }
}

pub fn print_snapshot(snapshot: &Snapshot) -> Result<()> {
    println!("{}", format!("== {}", snapshot.label).green().bold());
    println!("{}", serde_json::to_string_pretty(&snapshot.value)?);
    Ok(())
}

pub fn print_summary(store: &ScopedStore) {
    let tree = store.state();
    println!();
    println!(
        "{} {} action(s) reduced",
        "Done:".bold(),
        store.dispatch_count()
    );
    for namespace in tree.namespaces() {
        let count = tree.namespace(namespace).map_or(0, |ns| ns.len());
        println!("  {} {} instance(s)", namespace.yellow(), count);
    }
}
