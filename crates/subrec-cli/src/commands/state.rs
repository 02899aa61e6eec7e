use anyhow::Result;
use subrec_store::{
    entitlement_path, latest_for, payments_path, read_entitlement_record, read_payments,
};

use super::ResolvedTarget;

/// One line per category: `category=.. tier=.. mismatch_detected=..`.
pub async fn status(target: &ResolvedTarget) -> Result<()> {
    for &category in &target.categories {
        let rec = read_entitlement_record(&entitlement_path(&target.state_dir, category)).await?;
        println!(
            "category={} tier={} mismatch_detected={}",
            category,
            rec.tier.as_str(),
            rec.mismatch_detected
        );
    }
    Ok(())
}

/// Latest payment per category, or `pending=none`.
pub async fn pending(target: &ResolvedTarget) -> Result<()> {
    let all = read_payments(&payments_path(&target.state_dir)).await?;
    for &category in &target.categories {
        match latest_for(&all, category) {
            Some(p) => println!(
                "category={} id={} state={} updated_at={}",
                category,
                p.id,
                p.state.as_str(),
                p.updated_at.to_rfc3339()
            ),
            None => println!("category={category} pending=none"),
        }
    }
    Ok(())
}
