use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use xgfile::{ArchiveContainer, FlatFile, GameRecord, RichGameHeader, SegmentWalker};

#[derive(Parser)]
#[command(name = "xgfile", about = "Inspect and extract XG backgammon match files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the preamble header fields
    Info {
        input: PathBuf,
    },
    /// List the archived sub-files
    List {
        input: PathBuf,
    },
    /// Extract every segment into a directory
    Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Decode the game records and print one summary line per record
    Records {
        input: PathBuf,
        /// Read the file as a flat compressed slot stream instead of an archive
        #[arg(long)]
        flat: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    match Cli::parse().command {
        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let data = std::fs::read(&input)?;
            let header = RichGameHeader::decode(&data)?;
            println!("── XG file ──────────────────────────────────────────────");
            println!("  Path            {}", input.display());
            println!("  Header version  {}", header.version);
            println!("  GUID            {}", header.guid);
            println!("  Game name       {}", header.game_name);
            println!("  Save name       {}", header.save_name);
            println!("  Level name      {}", header.level_name);
            println!("  Comments        {}", header.comments);
            if header.has_thumbnail() {
                println!(
                    "  Thumbnail       {} B at offset {}",
                    header.thumbnail_size, header.thumbnail_offset
                );
            } else {
                println!("  Thumbnail       none");
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let archive = ArchiveContainer::open(File::open(&input)?)?;
            println!("Archive: {}", input.display());
            println!(
                "{:<16} {:>10} {:>10}  {:<10} {}",
                "Name", "Size", "Stored", "Mode", "CRC32"
            );
            for entry in archive.entries() {
                let mode = if entry.is_compressed() { "deflate" } else { "stored" };
                println!(
                    "{:<16} {:>10} {:>10}  {:<10} {:08x}",
                    entry.name, entry.osize, entry.csize, mode, entry.crc
                );
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir } => {
            if !output_dir.exists() {
                std::fs::create_dir_all(&output_dir)?;
            }
            let mut walker = SegmentWalker::open(File::open(&input)?)?;
            while let Some(segment) = walker.next_segment()? {
                let dest = output_dir.join(&segment.name);
                File::create(&dest)?.write_all(segment.bytes())?;
                println!(
                    "  {:<16} {:>10} B  ({:?})",
                    segment.name,
                    segment.len(),
                    segment.role
                );
            }
            println!("Extracted to: {}", output_dir.display());
        }

        // ── Records ──────────────────────────────────────────────────────────
        Commands::Records { input, flat } => {
            let records: Vec<GameRecord> = if flat {
                FlatFile::read(File::open(&input)?)?.into_records().collect()
            } else {
                xgfile::game_records(File::open(&input)?)?.collect()
            };

            for (i, record) in records.iter().enumerate() {
                match record {
                    GameRecord::MatchHeader(r) => println!(
                        "{i:>5}  match   {} vs {} to {}",
                        r.player1, r.player2, r.match_length
                    ),
                    GameRecord::GameHeader(r) => {
                        println!("{i:>5}  game    {}-{}", r.score1, r.score2)
                    }
                    GameRecord::Cube(r) => println!(
                        "{i:>5}  cube    player {} double {} take {}",
                        r.active_player, r.double, r.take
                    ),
                    GameRecord::Move(r) => println!(
                        "{i:>5}  move    player {} dice {}{} err {:.4}",
                        r.active_player, r.dice[0], r.dice[1], r.err_move
                    ),
                    GameRecord::GameFooter(r) => println!(
                        "{i:>5}  end     {}-{} winner {}",
                        r.score1, r.score2, r.winner
                    ),
                    GameRecord::MatchFooter(r) => println!(
                        "{i:>5}  final   {}-{} winner {}",
                        r.score1, r.score2, r.winner
                    ),
                    GameRecord::Unknown(r) => {
                        println!("{i:>5}  ?       entry type {}", r.entry_type)
                    }
                }
            }
            println!("{} record(s)", records.len());
        }
    }

    Ok(())
}
