//! Line commands for the terminal front end

use crate::session::{NewNote, NewTask};
use chrono::NaiveDate;
use thiserror::Error;

/// A quick prompt category shown by `/prompts`
pub struct PromptCategory {
    pub title: &'static str,
    pub items: &'static [&'static str],
}

pub const QUICK_PROMPTS: &[PromptCategory] = &[
    PromptCategory {
        title: "Marketing",
        items: &[
            "Write a social post about our weekend discount.",
            "Draft a promo SMS to drive bookings.",
        ],
    },
    PromptCategory {
        title: "Client",
        items: &[
            "Summarize this client conversation:",
            "Write a polite rescheduling message.",
        ],
    },
    PromptCategory {
        title: "Planning",
        items: &[
            "Create a task list for product launch.",
            "Generate content ideas for next month.",
        ],
    },
];

/// Quick prompts in display order, numbered from 1 by `/prompts`
pub fn quick_prompt(number: usize) -> Option<&'static str> {
    QUICK_PROMPTS
        .iter()
        .flat_map(|category| category.items.iter().copied())
        .nth(number.checked_sub(1)?)
}

pub const HELP: &str = "\
Type a message and press enter to send it.

  /stop                     stop revealing the current reply
  /regenerate               send the last message again
  /clear                    start a new session (notes and tasks are kept)
  /pin a | b | c            replace pinned context
  /pins                     show pinned context
  /note [n]                 save message n (default: last reply) as a note
  /newnote title | content | tag1, tag2
  /notes                    list notes
  /delnote n                delete note n
  /task [n]                 create a task from message n (default: last reply)
  /newtask title | due YYYY-MM-DD | tag | description
  /tasks                    list tasks
  /toggle n                 mark task n done or pending
  /deltask n                delete task n
  /copy [n]                 print message n (default: last reply)
  /prompts                  list quick prompts
  /prompt n                 send quick prompt n
  /help                     show this help
  /quit                     exit";

/// Title given to notes and tasks created without one
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Stop,
    Regenerate,
    Clear,
    Pin(Vec<String>),
    Pins,
    /// Message number, 1-based; `None` means the last reply
    Note(Option<usize>),
    NewNote(NewNote),
    Notes,
    DeleteNote(usize),
    Task(Option<usize>),
    NewTask(NewTask),
    Tasks,
    Toggle(usize),
    DeleteTask(usize),
    Copy(Option<usize>),
    Prompts,
    Prompt(usize),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0}, try /help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid due date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(name, args)| (name, args.trim()));

    let command = match name {
        "stop" => Command::Stop,
        "regenerate" | "regen" => Command::Regenerate,
        "clear" => Command::Clear,
        "pin" => Command::Pin(split_fields(args).map(str::to_string).collect()),
        "pins" => Command::Pins,
        "note" => Command::Note(optional_number(args, "/note [n]")?),
        "newnote" => Command::NewNote(new_note(args)?),
        "notes" => Command::Notes,
        "delnote" => Command::DeleteNote(number(args, "/delnote n")?),
        "task" => Command::Task(optional_number(args, "/task [n]")?),
        "newtask" => Command::NewTask(new_task(args)?),
        "tasks" => Command::Tasks,
        "toggle" => Command::Toggle(number(args, "/toggle n")?),
        "deltask" => Command::DeleteTask(number(args, "/deltask n")?),
        "copy" => Command::Copy(optional_number(args, "/copy [n]")?),
        "prompts" => Command::Prompts,
        "prompt" => Command::Prompt(number(args, "/prompt n")?),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn split_fields(args: &str) -> impl Iterator<Item = &str> {
    args.split('|').map(str::trim).filter(|field| !field.is_empty())
}

fn number(args: &str, usage: &'static str) -> Result<usize, CommandError> {
    args.parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or(CommandError::Usage(usage))
}

fn optional_number(args: &str, usage: &'static str) -> Result<Option<usize>, CommandError> {
    if args.is_empty() {
        Ok(None)
    } else {
        number(args, usage).map(Some)
    }
}

fn title_or_untitled(field: Option<&str>) -> &str {
    field.filter(|title| !title.is_empty()).unwrap_or(UNTITLED)
}

fn new_note(args: &str) -> Result<NewNote, CommandError> {
    let mut fields = args.splitn(3, '|').map(str::trim);
    let title = title_or_untitled(fields.next());
    let content = fields.next().unwrap_or_default();
    let tags = fields
        .next()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();

    Ok(NewNote {
        title: title.to_string(),
        content: content.to_string(),
        tags,
    })
}

fn new_task(args: &str) -> Result<NewTask, CommandError> {
    let mut fields = args.splitn(4, '|').map(str::trim);
    let title = title_or_untitled(fields.next());

    let due = fields.next().unwrap_or_default();
    let due = due.strip_prefix("due").map_or(due, str::trim);
    let due_date = if due.is_empty() {
        None
    } else {
        Some(
            NaiveDate::parse_from_str(due, "%Y-%m-%d")
                .map_err(|_| CommandError::InvalidDate(due.to_string()))?,
        )
    };

    let non_empty = |field: Option<&str>| {
        field
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let tag = non_empty(fields.next());
    let description = non_empty(fields.next());

    Ok(NewTask {
        due_date,
        tag,
        description,
        ..NewTask::titled(title)
    })
}
