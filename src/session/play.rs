use colored::{ColoredString, Colorize};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};

use crate::{
    client::quiz_api_client::{QuizApiClient, QuizApiError},
    saved::models::SavedQuizRecord,
    session::models::{OptionStyle, Phase, QuizBoard, QuizSession, Selection},
};

#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("Terminal io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Api(#[from] QuizApiError),
}

pub async fn play(
    api: &QuizApiClient,
    topic: &str,
    count: i64,
    save: bool,
) -> Result<(), PlayError> {
    let mut board = QuizBoard::new();

    let Some(ticket) = board.begin(topic, count) else {
        report_failure(&board);
        return Ok(());
    };

    if board.is_loading() {
        println!("{}", "Generating...".dimmed());
    }
    let result = api.generate(topic, count).await.map_err(|e| {
        error!("Client error during quiz generation: {}", e);
        e
    });
    board.resolve(ticket, result);

    if !matches!(board.phase(), Phase::Loaded(_)) {
        report_failure(&board);
        return Ok(());
    }
    let Some(session) = board.session_mut() else {
        return Ok(());
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let finished = answer_questions(session, &mut lines).await?;

    if finished {
        println!();
        println!("{}", "Quiz Complete!".bold());
        println!("Your Score: {} / {}", session.score(), session.quiz().len());
        println!();
        for index in 0..session.quiz().len() {
            print_question(session, index);
            if let Some(answer) = session.answer(index) {
                println!("   You answered: {}", answer);
            }
        }
    }

    if save {
        match api.save(topic, session.quiz()).await {
            Ok(record) => println!("Saved quiz {} ({}).", record.id, record.topic),
            Err(e) => {
                error!("Failed to save quiz: {}", e);
                println!("{}", format!("Could not save quiz: {}", short_message(&e)).red());
            }
        }
    }

    Ok(())
}

/// Returns false if the player quit before answering everything.
async fn answer_questions(
    session: &mut QuizSession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<bool, PlayError> {
    for index in 0..session.quiz().len() {
        println!(
            "\n{} ({} remaining)",
            "Your Quiz".bold(),
            session.remaining()
        );
        print_question(session, index);

        loop {
            println!("Pick an option number, or 'q' to quit:");
            let Some(line) = lines.next_line().await? else {
                return Ok(false);
            };

            let line = line.trim();
            if line.eq_ignore_ascii_case("q") {
                return Ok(false);
            }

            let option = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| session.question(index)?.options.get(i).cloned());

            let Some(option) = option else {
                println!("{}", "Not an option.".yellow());
                continue;
            };

            if let Selection::Recorded { correct } = session.select(index, &option) {
                print_question(session, index);
                let status = if correct {
                    "Status: Correct!".green().bold()
                } else {
                    "Status: Incorrect.".red().bold()
                };
                if let Some(question) = session.question(index) {
                    println!("{} The correct answer is: {}", status, question.answer);
                }
                break;
            }
        }
    }

    Ok(session.is_complete())
}

fn print_question(session: &QuizSession, index: usize) {
    let Some(question) = session.question(index) else {
        return;
    };

    println!("{}. {}", index + 1, question.question.bold());
    for (n, option) in question.options.iter().enumerate() {
        let style = session.option_style(index, option);
        println!("   {}) {}", n + 1, styled(option, style));
    }
}

fn styled(option: &str, style: OptionStyle) -> ColoredString {
    match style {
        OptionStyle::Neutral => option.normal(),
        OptionStyle::Correct => option.green().bold(),
        OptionStyle::Incorrect => option.red().bold(),
    }
}

fn report_failure(board: &QuizBoard) {
    if let Phase::Failed(message) = board.phase() {
        println!("{}", message.red());
    }
}

fn short_message(e: &QuizApiError) -> String {
    match e {
        QuizApiError::ApiError(_, message) | QuizApiError::Feed(message) => message.clone(),
        _ => "the server could not be reached".into(),
    }
}

pub async fn history(api: &QuizApiClient, follow: bool) -> Result<(), PlayError> {
    if !follow {
        let records = api.list().await?;
        print_records(&records);
        return Ok(());
    }

    let feed = api.watch().await?;
    let mut feed = Box::pin(feed);
    info!("Watching saved quizzes, press ctrl-c to stop");

    loop {
        tokio::select! {
            update = feed.next() => match update {
                Some(Ok(records)) => print_records(&records),
                Some(Err(e)) => {
                    error!("Saved quiz feed stopped: {}", e);
                    println!("{}", format!("Saved quizzes unavailable: {}", short_message(&e)).red());
                    return Ok(());
                }
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn print_records(records: &[SavedQuizRecord]) {
    println!("\n{} saved quizzes", records.len());
    for record in records {
        println!(
            "  {}  {}  ({} questions)  {}",
            record.date.format("%Y-%m-%d %H:%M"),
            record.topic.bold(),
            record.num_questions,
            record.id.to_string().dimmed()
        );
    }
}
