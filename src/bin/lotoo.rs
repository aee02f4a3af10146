//! Lotoo command line
//!
//! Interactive shell over a lotoo context, plus a test pack generator

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use lotoo::{
    Card, CardTracker, CardType, Context, ContextConfig, GameHandle, PackHandle, PackWriter,
    Square,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_PACK: &str = "default.zip";

#[derive(Parser, Debug)]
#[command(name = "lotoo")]
#[command(about = "Quiz bingo engine shell", version)]
struct Args {
    /// Context configuration file (TOML)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Print cards as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run shell commands, then keep reading them from stdin
    Shell {
        /// Commands run before reading stdin (quote multi-word commands)
        commands: Vec<String>,
    },
    /// Write a pack of answerNNN.txt/questionNNN members
    GenPack {
        /// Output archive
        out: PathBuf,

        /// Number of quizzes
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,

        /// Archive comment used as the pack title
        #[arg(short = 't', long)]
        title: Option<String>,
    },
}

/// Whether the shell keeps reading commands
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

struct Shell {
    ctx: Context,
    json: bool,
    pack: Option<PackHandle>,
    game: Option<GameHandle>,
    game_position: u32,
    card_index: u32,
}

impl Shell {
    fn new(ctx: Context, json: bool) -> Self {
        Shell {
            ctx,
            json,
            pack: None,
            game: None,
            game_position: 0,
            card_index: 0,
        }
    }

    fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> anyhow::Result<Flow> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Flow::Continue);
        };
        let argument = words.next();

        match command {
            "exit" => {
                writeln!(out, "< Exiting")?;
                return Ok(Flow::Exit);
            }
            "load" => self.load(argument.unwrap_or(DEFAULT_PACK), out)?,
            "card_next" => self.card_next(argument, out)?,
            "game_start" => self.game_start(out)?,
            "game_next" => self.game_next(out)?,
            "game_end" => self.game_end(out)?,
            "game_test" => self.game_test(out)?,
            _ => writeln!(out, "< Unknown command")?,
        }
        Ok(Flow::Continue)
    }

    fn load<W: Write>(&mut self, path: &str, out: &mut W) -> anyhow::Result<()> {
        writeln!(out, "< Loading pack \"{}\"", path)?;
        match self.ctx.load_pack_file(path) {
            Ok(handle) => {
                let pack = self.ctx.pack(handle)?;
                writeln!(out, "< Pack loaded ({} quizzes found)", pack.quiz_count())?;
                self.pack = Some(handle);
            }
            Err(e) => writeln!(out, "< Unable to load pack: {}", e)?,
        }
        Ok(())
    }

    fn card_next<W: Write>(&mut self, argument: Option<&str>, out: &mut W) -> anyhow::Result<()> {
        let Some(pack) = self.pack else {
            writeln!(out, "< load a pack to generate cards")?;
            return Ok(());
        };
        let Some(card_type) = argument.and_then(parse_card_type) else {
            writeln!(out, "< choose a type of card (1, 2 or 3)")?;
            return Ok(());
        };

        writeln!(out, "< generated card")?;
        match self.ctx.pack(pack)?.card(card_type, self.card_index) {
            Ok(card) => {
                self.print_card(&card, out)?;
                self.card_index += 1;
            }
            Err(e) => writeln!(out, "\tpack is invalid for such cards: {}", e)?,
        }
        Ok(())
    }

    fn game_start<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        if self.game.is_some() {
            writeln!(out, "< game_start has already been called")?;
            return Ok(());
        }
        let Some(pack) = self.pack else {
            writeln!(out, "< load a pack before starting a game")?;
            return Ok(());
        };

        writeln!(out, "< starting games with following pack")?;
        writeln!(out, "\t[{} quizzes]", self.ctx.pack(pack)?.quiz_count())?;
        self.game = Some(
            self.ctx
                .start_game(pack, CardType::OneLine1x5, rand::random())?,
        );
        self.game_position = 0;
        Ok(())
    }

    fn game_next<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let Some(handle) = self.game else {
            writeln!(out, "< Call game_start first")?;
            return Ok(());
        };

        let game = self.ctx.game(handle)?;
        if self.game_position < game.quiz_count() {
            let quiz = game.quiz(self.game_position)?;
            writeln!(
                out,
                "< Quiz [{}] {}->{}",
                self.game_position,
                String::from_utf8_lossy(&quiz.data),
                quiz.name
            )?;
            self.game_position += 1;
        } else {
            writeln!(out, "< Quizzes end reached")?;
        }
        Ok(())
    }

    fn game_end<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        match self.game.take() {
            Some(handle) => {
                self.ctx.end_game(handle)?;
                writeln!(out, "< game_end")?;
            }
            None => writeln!(out, "< Call game_start first")?,
        }
        Ok(())
    }

    /// Play a full 5x5 game against one random card until it wins
    fn game_test<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let Some(pack) = self.pack else {
            writeln!(out, "< load a pack before testing a game")?;
            return Ok(());
        };

        let card_type = CardType::USStyle5x5;
        let handle = self.ctx.start_game(pack, card_type, rand::random())?;
        let outcome = self.play_test_game(handle, rand::random(), out);
        self.ctx.end_game(handle)?;
        outcome
    }

    fn play_test_game<W: Write>(
        &self,
        handle: GameHandle,
        card_index: u32,
        out: &mut W,
    ) -> anyhow::Result<()> {
        let game = self.ctx.game(handle)?;
        let mut tracker = match CardTracker::new(game, card_index) {
            Ok(tracker) => tracker,
            Err(e) => {
                writeln!(out, "< [TEST] pack is invalid for such cards: {}", e)?;
                return Ok(());
            }
        };

        writeln!(out, "< [TEST] Watching card")?;
        self.print_card(tracker.card(), out)?;
        writeln!(out, "< [TEST] Start")?;

        for position in 0..game.quiz_count() {
            let quiz = game.quiz(position)?;
            writeln!(
                out,
                "< [TEST] Quiz [{:04}] {}",
                position,
                String::from_utf8_lossy(&quiz.data)
            )?;

            let status = tracker.advance_to(game, position)?;
            if status.is_win() {
                writeln!(out, "< [TEST] BINGO {} !", status.label())?;
                break;
            }
        }
        writeln!(out, "< [TEST] End")?;
        Ok(())
    }

    fn print_card<W: Write>(&self, card: &Card, out: &mut W) -> anyhow::Result<()> {
        if self.json {
            writeln!(out, "{}", serde_json::to_string_pretty(card)?)?;
            return Ok(());
        }

        let rows: Vec<String> = card
            .rows()
            .map(|row| {
                let cells: Vec<&str> = row
                    .iter()
                    .map(|square| match square {
                        Square::Named(name) => name.as_ref(),
                        Square::Free => "FREE",
                        Square::Blank => "XXXXXXXXXXXX",
                    })
                    .collect();
                format!("\t{}", cells.join(",\t"))
            })
            .collect();
        writeln!(out, "\t[{}]", rows.join("\n").trim_start())?;
        Ok(())
    }

    fn close(self) {
        self.ctx.close();
    }
}

fn parse_card_type(argument: &str) -> Option<CardType> {
    match argument {
        "1" => Some(CardType::OneLine1x5),
        "2" => Some(CardType::USStyle5x5),
        "3" => Some(CardType::EUStyle3x9),
        _ => None,
    }
}

fn run_shell(ctx: Context, json: bool, commands: &[String]) -> anyhow::Result<()> {
    let mut shell = Shell::new(ctx, json);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "Lotoo CLI")?;
    for command in commands {
        if shell.execute(command, &mut out)? == Flow::Exit {
            shell.close();
            return Ok(());
        }
    }

    let stdin = io::stdin();
    loop {
        write!(out, "?>")?;
        out.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if shell.execute(&line, &mut out)? == Flow::Exit {
            break;
        }
    }

    shell.close();
    Ok(())
}

fn gen_pack(out: &Path, count: usize, title: Option<String>) -> anyhow::Result<()> {
    if count == 0 {
        bail!("a pack needs at least one quiz");
    }

    let mut writer = PackWriter::new();
    if let Some(title) = title {
        writer = writer.with_title(title);
    }
    for i in 0..count {
        writer.add_quiz(&format!("answer{:03}.txt", i), format!("question{:03}", i))?;
    }

    let bytes = writer.finish()?;
    std::fs::write(out, &bytes).with_context(|| format!("writing {:?}", out))?;
    info!("Wrote {} quizzes ({} bytes) to {:?}", count, bytes.len(), out);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Shell { commands } => {
            let config = match &args.config {
                Some(path) => ContextConfig::from_file(path)
                    .with_context(|| format!("loading config {:?}", path))?,
                None => ContextConfig::default(),
            };
            let ctx = Context::with_config(config, None)?;
            run_shell(ctx, args.json, &commands)
        }
        Command::GenPack { out, count, title } => gen_pack(&out, count, title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shell_with_pack(count: usize) -> (TempDir, Shell) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pack.zip");
        gen_pack(&path, count, None).unwrap();

        let mut shell = Shell::new(Context::new(), false);
        let mut out = Vec::new();
        shell
            .execute(&format!("load {}", path.display()), &mut out)
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Pack loaded"));
        (dir, shell)
    }

    fn run(shell: &mut Shell, line: &str) -> String {
        let mut out = Vec::new();
        shell.execute(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_commands_need_a_pack() {
        let mut shell = Shell::new(Context::new(), false);
        assert!(run(&mut shell, "card_next 1").contains("load a pack"));
        assert!(run(&mut shell, "game_start").contains("load a pack"));
        assert!(run(&mut shell, "game_next").contains("game_start first"));
        assert!(run(&mut shell, "bogus").contains("Unknown command"));
    }

    #[test]
    fn test_card_next_increments_index() {
        let (_dir, mut shell) = shell_with_pack(30);
        assert!(run(&mut shell, "card_next").contains("choose a type"));
        assert!(run(&mut shell, "card_next 2").contains("FREE"));
        assert_eq!(shell.card_index, 1);
        run(&mut shell, "card_next 3");
        assert_eq!(shell.card_index, 2);
    }

    #[test]
    fn test_card_next_on_small_pack() {
        let (_dir, mut shell) = shell_with_pack(10);
        assert!(run(&mut shell, "card_next 2").contains("pack is invalid"));
        assert_eq!(shell.card_index, 0);
    }

    #[test]
    fn test_game_walkthrough() {
        let (_dir, mut shell) = shell_with_pack(3);
        assert!(run(&mut shell, "game_start").contains("[3 quizzes]"));
        assert!(run(&mut shell, "game_start").contains("already been called"));
        for _ in 0..3 {
            assert!(run(&mut shell, "game_next").contains("< Quiz ["));
        }
        assert!(run(&mut shell, "game_next").contains("end reached"));
        assert!(run(&mut shell, "game_end").contains("game_end"));
        assert!(run(&mut shell, "game_end").contains("game_start first"));
    }

    #[test]
    fn test_game_test_reaches_bingo() {
        let (_dir, mut shell) = shell_with_pack(40);
        let output = run(&mut shell, "game_test");
        assert!(output.contains("BINGO"));
        assert!(output.contains("[TEST] End"));
        assert_eq!(shell.ctx.stats().games, 0);
    }

    #[test]
    fn test_exit() {
        let mut shell = Shell::new(Context::new(), false);
        let mut out = Vec::new();
        assert_eq!(shell.execute("exit", &mut out).unwrap(), Flow::Exit);
    }

    #[test]
    fn test_json_cards() {
        let (_dir, mut shell) = shell_with_pack(30);
        shell.json = true;
        let output = run(&mut shell, "card_next 1");
        let json = output.trim_start_matches("< generated card\n");
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["card_type"], "OneLine1x5");
    }
}
