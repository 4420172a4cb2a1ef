use crate::cli::{open_store, read_syllabus, SubjectCommands};
use crate::config::Config;
use crate::error::Result;
use crate::ui;

/// Run subject subcommands
pub fn run_subjects(config: &Config, command: SubjectCommands) -> Result<()> {
    match command {
        SubjectCommands::New {
            name,
            syllabus,
            description,
        } => new_subject(config, &name, syllabus.as_deref(), description.as_deref()),
        SubjectCommands::List => list_subjects(config),
        SubjectCommands::Note {
            subject,
            concept,
            note,
        } => add_note(config, &subject, &concept, &note),
    }
}

fn new_subject(
    config: &Config,
    name: &str,
    syllabus: Option<&std::path::Path>,
    description: Option<&str>,
) -> Result<()> {
    let store = open_store(config);
    crate::store::validate_name(name)?;
    let syllabus = read_syllabus(syllabus, name)?;

    let dir = store.initialize_subject(name, &syllabus, description)?;
    ui::print_success(&format!("Created subject '{}' at {}", name, dir.display()));
    ui::print_info(&format!("Add a module with 'study module new \"{}\" <module>'", name));
    Ok(())
}

fn list_subjects(config: &Config) -> Result<()> {
    let structure = open_store(config).load_structure();

    if structure.is_empty() {
        ui::print_info("No subjects yet");
        ui::print_info("Use 'study subject new <name>' to create one");
        return Ok(());
    }

    println!("{:<30} {:<8} {:<8} {}", "SUBJECT", "MODULES", "SAVED", "DESCRIPTION");
    println!("{}", "-".repeat(80));

    for (name, entry) in &structure {
        let (saved, description) = entry
            .context
            .as_ref()
            .map(|c| (c.saved_content.len(), c.description.as_str()))
            .unwrap_or((0, ""));
        println!(
            "{:<30} {:<8} {:<8} {}",
            truncate(name, 28),
            entry.modules.len(),
            saved,
            truncate(description, 30)
        );
    }

    Ok(())
}

fn add_note(config: &Config, subject: &str, concept: &str, note: &str) -> Result<()> {
    open_store(config).add_concept_note(subject, concept, note)?;
    ui::print_success(&format!("Noted '{}' for {}", concept, subject));
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Physics", 28), "Physics");
        assert_eq!(truncate("Formal Languages and Automata", 10), "Formal ...");
    }
}
