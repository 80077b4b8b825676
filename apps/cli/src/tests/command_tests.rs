use super::*;

fn parse(line: &str) -> Command {
    parse_command(line)
        .expect("valid command")
        .expect("non-blank line")
}

#[test]
fn blank_lines_are_ignored() {
    assert_eq!(parse_command("   "), Ok(None));
}

#[test]
fn simple_commands_and_aliases() {
    assert_eq!(parse("list"), Command::List);
    assert_eq!(parse("LS"), Command::List);
    assert_eq!(parse("show"), Command::Show);
    assert_eq!(parse("panel"), Command::Panel);
    assert_eq!(parse("theme"), Command::Theme);
    assert_eq!(parse("status"), Command::Status);
    assert_eq!(parse("?"), Command::Help);
    assert_eq!(parse("exit"), Command::Quit);
}

#[test]
fn open_and_delete_take_exactly_one_id() {
    assert_eq!(
        parse("open 4f1c-aa"),
        Command::Open(DocumentId::new("4f1c-aa"))
    );
    assert_eq!(parse("rm  x1 "), Command::Delete(DocumentId::new("x1")));
    assert!(matches!(
        parse_command("open"),
        Err(CommandError::MissingArgument { command: "open", .. })
    ));
    assert!(matches!(
        parse_command("delete a b"),
        Err(CommandError::InvalidArgument { command: "delete", .. })
    ));
}

#[test]
fn upload_keeps_spaces_in_paths() {
    assert_eq!(
        parse("upload ~/Documenti/relazione finale.pdf"),
        Command::Upload(PathBuf::from("~/Documenti/relazione finale.pdf"))
    );
    assert!(parse_command("upload").is_err());
}

#[test]
fn summary_options_in_any_order() {
    assert_eq!(
        parse("summary"),
        Command::Summary {
            length: None,
            accuracy: None
        }
    );
    assert_eq!(
        parse("summary alta breve"),
        Command::Summary {
            length: Some(SummaryLength::Breve),
            accuracy: Some(AccuracyLevel::Alta)
        }
    );
    assert_eq!(
        parse("summary Dettagliato"),
        Command::Summary {
            length: Some(SummaryLength::Dettagliato),
            accuracy: None
        }
    );
}

#[test]
fn summary_rejects_unknown_or_repeated_tokens() {
    assert_eq!(
        parse_command("summary lunghissimo"),
        Err(CommandError::InvalidArgument {
            command: "summary",
            value: "lunghissimo".to_string()
        })
    );
    assert!(parse_command("summary breve medio").is_err());
}

#[test]
fn schema_type_is_optional() {
    assert_eq!(parse("schema"), Command::Schema(None));
    assert_eq!(
        parse("schema cascata"),
        Command::Schema(Some(SchemaType::Cascata))
    );
    assert!(parse_command("schema albero").is_err());
}

#[test]
fn export_content_with_optional_name() {
    assert_eq!(
        parse("export summary"),
        Command::Export {
            content: ExportContent::Summary,
            name: None
        }
    );
    assert_eq!(
        parse("export full contratto completo"),
        Command::Export {
            content: ExportContent::Full,
            name: Some("contratto completo".to_string())
        }
    );
    assert!(parse_command("export").is_err());
    assert!(parse_command("export pdf").is_err());
}

#[test]
fn chat_keeps_the_message_verbatim() {
    assert_eq!(
        parse("chat Quali sono  le scadenze?"),
        Command::Chat("Quali sono  le scadenze?".to_string())
    );
    assert!(parse_command("chat   ").is_err());
}

#[test]
fn unknown_commands_are_reported() {
    let err = parse_command("frobnicate now").expect_err("unknown");
    assert_eq!(err, CommandError::Unknown("frobnicate".to_string()));
    assert!(err.to_string().contains("help"));
}
