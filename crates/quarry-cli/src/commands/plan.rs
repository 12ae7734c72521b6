//! `quarry plan` command implementation.
//!
//! Introspects the schema, then prints what `quarry ask` would run.

use super::Startup;
use anyhow::Result;
use quarry_core::QuarryConfig;
use quarry_runtime::QueryPlan;

pub async fn run(config: &QuarryConfig, question: &str, json: bool) -> Result<()> {
    let startup = Startup::connect(config).await?;
    let plan = startup.orchestrator(config).plan(question)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render(&plan));
    }
    Ok(())
}

fn render(plan: &QueryPlan) -> String {
    let c = &plan.classification;
    let mut out = format!("Intent: {}\nResolution: {:?}\n", c.intent, c.resolution);
    if plan.tables.is_empty() {
        out.push_str("No relevant table.\n");
        return out;
    }

    for table in &plan.tables {
        out.push_str(&format!("\n[{}]\n", table.table));
        if let Some(reason) = &table.skipped {
            out.push_str(&format!("  skipped: {reason}\n"));
        }
        for statement in &table.statements {
            out.push_str(&format!("  {};\n", statement.inline()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_planner::{Classification, Intent, Resolution, Statement};
    use quarry_runtime::TablePlan;
    use std::collections::BTreeSet;

    #[test]
    fn renders_inline_sql_per_table() {
        let plan = QueryPlan {
            classification: Classification {
                intent: Intent::Search,
                tables: BTreeSet::from(["customers".to_string()]),
                resolution: Resolution::CatalogMention,
            },
            tables: vec![TablePlan {
                table: "customers".to_string(),
                statements: vec![
                    Statement::new(
                        r#"SELECT DISTINCT "customers".* FROM "customers" WHERE "customers"."name" LIKE $1 LIMIT 100"#,
                    )
                    .with_param("%O'Brien%"),
                ],
                skipped: None,
            }],
        };

        assert_eq!(
            render(&plan),
            concat!(
                "Intent: SEARCH\nResolution: CatalogMention\n\n[customers]\n",
                r#"  SELECT DISTINCT "customers".* FROM "customers" WHERE "customers"."name" LIKE '%O''Brien%' LIMIT 100;"#,
                "\n"
            )
        );
    }

    #[test]
    fn renders_empty_plan() {
        let plan = QueryPlan {
            classification: Classification {
                intent: Intent::Count,
                tables: BTreeSet::new(),
                resolution: Resolution::Unresolved,
            },
            tables: Vec::new(),
        };
        assert_eq!(render(&plan), "Intent: COUNT\nResolution: Unresolved\nNo relevant table.\n");
    }
}
