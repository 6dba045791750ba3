//! Whole-slot jobs built from flash protocol operations
//!
//! Policies differ on purpose between jobs:
//!
//! - reading fails on the first block error,
//! - flashing skips blocks whose programming fails (the failures are
//!   listed in the [`FlashReport`]) but aborts on an erase error,
//! - the final read-back comparison decides whether a flash succeeded.

use p2kflash_core::cartridge::{
    sector_of, starts_sector, BLOCKS_PER_SLOT, BLOCK_SIZE, SECTORS_PER_SLOT, SLOT_SIZE,
};
use p2kflash_core::{ChipIdentity, RawImage, Slot};
use p2kflash_serial::{BoardInfo, Cartridge, Delay, ProtocolError, Transport};

use crate::error::{JobError, Result, SkippedBlock};
use crate::progress::{Phase, ProgressSink, Tracker};

/// Outcome of a flash job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    /// Slot that was written
    pub slot: Slot,
    /// Chip found before writing
    pub chip: ChipIdentity,
    /// Sectors erased, in order
    pub erased_sectors: Vec<u16>,
    /// Blocks whose programming failed
    pub skipped: Vec<SkippedBlock>,
    /// Whether the slot was read back and matched
    pub verified: bool,
}

/// Outcome of an erase job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraseReport {
    /// Slot that was erased
    pub slot: Slot,
    /// Chip found before erasing
    pub chip: ChipIdentity,
    /// Erase cycle count reported per sector
    pub cycles: Vec<(u16, u16)>,
}

/// Board and chip identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Parsed READINFO string
    pub board: BoardInfo,
    /// Chip id, whether supported or not
    pub chip: ChipIdentity,
}

/// Zero-pad an image to a full slot, rejecting oversize images
pub fn pad_image(image: &[u8]) -> Result<Vec<u8>> {
    RawImage::from(image)
        .padded_to(SLOT_SIZE)
        .ok_or(JobError::ImageTooLarge {
            len: image.len(),
            capacity: SLOT_SIZE,
        })
}

fn identify<T: Transport, D: Delay>(cart: &mut Cartridge<T, D>) -> Result<ChipIdentity> {
    match cart.identify_chip() {
        Ok(chip) => Ok(chip),
        Err(ProtocolError::UnsupportedChip(chip)) => Err(JobError::UnsupportedChip(chip)),
        Err(e) => Err(e.into()),
    }
}

fn read_slot<T: Transport, D: Delay>(
    cart: &mut Cartridge<T, D>,
    slot: Slot,
    phase: Phase,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(SLOT_SIZE);
    let mut tracker = Tracker::begin(progress, phase, BLOCKS_PER_SLOT);

    for (i, block) in slot.blocks().enumerate() {
        let bytes = cart
            .read_block(block)
            .map_err(|source| JobError::Block { block, source })?;
        data.extend_from_slice(&bytes);
        tracker.step(i + 1);
    }

    Ok(data)
}

fn compare(expected: &[u8], actual: &[u8], skipped: &[SkippedBlock]) -> Result<()> {
    let mut differing = expected
        .iter()
        .zip(actual)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(offset, _)| offset);

    if let Some(first_mismatch) = differing.next() {
        let mismatches = 1 + differing.count();
        log::error!(
            "Verification failed: {} byte(s) differ, first at 0x{:04X}",
            mismatches,
            first_mismatch
        );
        return Err(JobError::VerificationFailed {
            first_mismatch,
            mismatches,
            skipped: skipped.to_vec(),
        });
    }
    Ok(())
}

/// Read the 64 blocks of a slot
///
/// Fails on the first block error.
pub fn read_cartridge<T: Transport, D: Delay>(
    cart: &mut Cartridge<T, D>,
    slot: Slot,
    progress: &mut dyn ProgressSink,
) -> Result<RawImage> {
    log::info!("Reading {}", slot);
    let data = read_slot(cart, slot, Phase::Read, progress)?;
    log::info!("Read {} bytes from {}", data.len(), slot);
    Ok(RawImage::from(data))
}

/// Erase and program a slot, then (optionally) read it back and compare
///
/// The image is zero-padded to 16 KiB. The chip is identified before any
/// erase. Each sector is erased once, right before its first block. A
/// block that fails to program is logged, recorded in
/// [`FlashReport::skipped`] and the pass continues.
///
/// The write phase counts 68 units: every sector erase and every block
/// program advances it by one.
pub fn flash_cartridge<T: Transport, D: Delay>(
    cart: &mut Cartridge<T, D>,
    slot: Slot,
    image: &[u8],
    verify: bool,
    progress: &mut dyn ProgressSink,
) -> Result<FlashReport> {
    let data = pad_image(image)?;
    let chip = identify(cart)?;

    let mut report = FlashReport {
        slot,
        chip,
        erased_sectors: Vec::new(),
        skipped: Vec::new(),
        verified: false,
    };

    log::info!("Writing {} bytes to {}", image.len(), slot);
    let mut tracker = Tracker::begin(progress, Phase::Write, SECTORS_PER_SLOT + BLOCKS_PER_SLOT);
    let mut done = 0;
    for (block, chunk) in slot.blocks().zip(data.chunks_exact(BLOCK_SIZE)) {
        if starts_sector(block) {
            let sector = sector_of(block);
            cart.erase_sector(sector)
                .map_err(|source| JobError::Sector { sector, source })?;
            report.erased_sectors.push(sector);
            done += 1;
            tracker.step(done);
        }

        let mut buf = [0u8; BLOCK_SIZE];
        buf.copy_from_slice(chunk);
        if let Err(e) = cart.program_block(block, &buf) {
            log::warn!("Skipping block {}: {}", block, e);
            cart.channel().flush_residual();
            report.skipped.push(SkippedBlock {
                block,
                reason: e.to_string(),
            });
        }
        done += 1;
        tracker.step(done);
    }
    drop(tracker);

    if !report.skipped.is_empty() {
        log::warn!("{} block(s) skipped while writing", report.skipped.len());
    }

    if verify {
        let actual = read_slot(cart, slot, Phase::Verify, progress)?;
        compare(&data, &actual, &report.skipped)?;
        report.verified = true;
        log::info!("Verified {}", slot);
    }

    Ok(report)
}

/// Read a slot and compare it with a (zero-padded) expected image
pub fn verify_cartridge<T: Transport, D: Delay>(
    cart: &mut Cartridge<T, D>,
    slot: Slot,
    expected: &[u8],
    progress: &mut dyn ProgressSink,
) -> Result<()> {
    let expected = pad_image(expected)?;
    let actual = read_slot(cart, slot, Phase::Verify, progress)?;
    compare(&expected, &actual, &[])?;
    log::info!("Verified {}", slot);
    Ok(())
}

/// Erase the four sectors of a slot
pub fn erase_slot<T: Transport, D: Delay>(
    cart: &mut Cartridge<T, D>,
    slot: Slot,
    progress: &mut dyn ProgressSink,
) -> Result<EraseReport> {
    let chip = identify(cart)?;
    let sectors = slot.sectors();
    let mut tracker = Tracker::begin(progress, Phase::Erase, sectors.len());
    let mut cycles = Vec::with_capacity(sectors.len());

    for (i, sector) in sectors.enumerate() {
        let count = cart
            .erase_sector(sector)
            .map_err(|source| JobError::Sector { sector, source })?;
        cycles.push((sector, count));
        tracker.step(i + 1);
    }

    log::info!("Erased {}", slot);
    Ok(EraseReport { slot, chip, cycles })
}

/// Read the board identity and the chip id
///
/// An unsupported chip is reported, not rejected.
pub fn probe_board<T: Transport, D: Delay>(cart: &mut Cartridge<T, D>) -> Result<ProbeReport> {
    let board = cart.board_info()?;
    let chip = cart.read_chip_id()?;
    Ok(ProbeReport { board, chip })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoProgress, Progress};
    use p2kflash_dummy::{DummyBoard, DummyConfig, Faults};
    use p2kflash_serial::{ChannelConfig, CommandChannel, NoDelay};

    fn cartridge(board: &DummyBoard) -> Cartridge<DummyBoard, NoDelay> {
        let mut transport = board.clone();
        transport.open().unwrap();
        Cartridge::from_channel(CommandChannel::with_delay(
            transport,
            NoDelay,
            ChannelConfig::default(),
        ))
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[derive(Default)]
    struct Recorder(Vec<Progress>);

    impl ProgressSink for Recorder {
        fn update(&mut self, progress: &Progress) {
            self.0.push(*progress);
        }
    }

    #[test]
    fn test_pad_image() {
        let padded = pad_image(&[1, 2]).unwrap();
        assert_eq!(padded.len(), SLOT_SIZE);
        assert_eq!(padded[..2], [1, 2]);
        assert!(padded[2..].iter().all(|&b| b == 0));
        assert!(matches!(
            pad_image(&vec![0; SLOT_SIZE + 1]),
            Err(JobError::ImageTooLarge { len, capacity: SLOT_SIZE }) if len == SLOT_SIZE + 1
        ));
    }

    #[test]
    fn test_flash_then_read_reproduces_padded_image() {
        let board = DummyBoard::new_default();
        let mut cart = cartridge(&board);
        let image = pattern(16 * BLOCK_SIZE);
        let slot = Slot::new(0).unwrap();

        let report = flash_cartridge(&mut cart, slot, &image, true, &mut NoProgress).unwrap();
        assert!(report.verified);
        assert!(report.skipped.is_empty());
        assert_eq!(report.chip.id(), 0xBFB5);
        assert_eq!(report.erased_sectors, vec![0, 1, 2, 3]);

        let read = read_cartridge(&mut cart, slot, &mut NoProgress).unwrap();
        assert_eq!(read.as_bytes(), &pad_image(&image).unwrap()[..]);
    }

    #[test]
    fn test_flash_erases_once_per_sector_before_its_blocks() {
        let board = DummyBoard::new_default();
        let mut cart = cartridge(&board);
        let slot = Slot::new(1).unwrap();
        flash_cartridge(&mut cart, slot, &pattern(100), false, &mut NoProgress).unwrap();

        let ops: Vec<String> = board
            .history()
            .into_iter()
            .filter(|c| c.starts_with("ESST") || c.starts_with("WRBK"))
            .collect();
        assert_eq!(ops.len(), 4 + 64);
        assert_eq!(ops[0], "ESST0040");
        assert_eq!(ops[1], "WRBK0040");
        assert_eq!(ops[16], "WRBK004F");
        assert_eq!(ops[17], "ESST0050");
        assert_eq!(ops[18], "WRBK0050");
    }

    #[test]
    fn test_unsupported_chip_aborts_before_touching_flash() {
        let board = DummyBoard::new(DummyConfig {
            chip_response: [0xBF, 0xB4],
            ..Default::default()
        });
        let mut cart = cartridge(&board);
        let err = flash_cartridge(&mut cart, Slot::new(0).unwrap(), &[0; 10], true, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, JobError::UnsupportedChip(chip) if chip.id() == 0xBFB4));
        assert!(board.commands("ESST").is_empty());
        assert!(board.commands("WRBK").is_empty());
    }

    #[test]
    fn test_oversize_image_rejected_before_io() {
        let board = DummyBoard::new_default();
        let mut cart = cartridge(&board);
        let err = flash_cartridge(
            &mut cart,
            Slot::new(0).unwrap(),
            &vec![0; SLOT_SIZE + 1],
            true,
            &mut NoProgress,
        )
        .unwrap_err();
        assert!(matches!(err, JobError::ImageTooLarge { .. }));
        assert!(board.history().is_empty());
    }

    #[test]
    fn test_checksum_failures_are_skipped_and_reported() {
        let board = DummyBoard::new_default();
        board.set_faults(Faults {
            bad_checksum_blocks: vec![3, 40],
            ..Default::default()
        });
        let mut cart = cartridge(&board);
        let report =
            flash_cartridge(&mut cart, Slot::new(0).unwrap(), &pattern(SLOT_SIZE), true, &mut NoProgress)
                .unwrap();

        let skipped: Vec<u16> = report.skipped.iter().map(|s| s.block).collect();
        assert_eq!(skipped, vec![3, 40]);
        // The data still landed, so the read-back matches
        assert!(report.verified);
        assert_eq!(board.commands("WRBK").len(), 64);
    }

    #[test]
    fn test_lost_block_fails_verification() {
        let board = DummyBoard::new_default();
        board.set_faults(Faults {
            lost_blocks: vec![5],
            ..Default::default()
        });
        let mut cart = cartridge(&board);
        let image = vec![0x00u8; SLOT_SIZE];
        let err = flash_cartridge(&mut cart, Slot::new(0).unwrap(), &image, true, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(
            err,
            JobError::VerificationFailed {
                first_mismatch: 0x500,
                mismatches: BLOCK_SIZE,
                ref skipped,
            } if skipped.is_empty()
        ));
    }

    #[test]
    fn test_erase_failure_aborts() {
        let board = DummyBoard::new_default();
        board.set_faults(Faults {
            bad_echo: Some("ESST".into()),
            ..Default::default()
        });
        let mut cart = cartridge(&board);
        let err = flash_cartridge(&mut cart, Slot::new(2).unwrap(), &[1; 10], false, &mut NoProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::Sector {
                sector: 8,
                source: ProtocolError::EchoMismatch { .. }
            }
        ));
        assert!(board.commands("WRBK").is_empty());
    }

    #[test]
    fn test_flash_reports_erases_and_blocks() {
        let board = DummyBoard::new_default();
        let mut cart = cartridge(&board);
        let mut recorder = Recorder::default();
        flash_cartridge(&mut cart, Slot::new(0).unwrap(), &pattern(10), false, &mut recorder)
            .unwrap();

        let total = SECTORS_PER_SLOT + BLOCKS_PER_SLOT;
        assert_eq!(recorder.0.len(), total + 1);
        assert!(recorder.0.iter().all(|p| p.phase == Phase::Write && p.total == total));
        let completed: Vec<usize> = recorder.0.iter().map(|p| p.completed).collect();
        assert_eq!(completed, (0..=total).collect::<Vec<_>>());
    }

    #[test]
    fn test_skipped_erase_fails_verification() {
        let board = DummyBoard::with_data(DummyConfig::default(), &vec![0x0Fu8; SLOT_SIZE]);
        board.set_faults(Faults {
            ignore_erase: true,
            ..Default::default()
        });
        let mut cart = cartridge(&board);
        let err = flash_cartridge(
            &mut cart,
            Slot::new(0).unwrap(),
            &vec![0xF0u8; SLOT_SIZE],
            true,
            &mut NoProgress,
        )
        .unwrap_err();

        // Programming can only clear bits, so 0x0F & 0xF0 reads back as zero
        assert!(matches!(
            err,
            JobError::VerificationFailed {
                first_mismatch: 0,
                mismatches: SLOT_SIZE,
                ref skipped,
            } if skipped.is_empty()
        ));
        assert_eq!(board.commands("ESST").len(), SECTORS_PER_SLOT);
        assert!(board.flash()[..SLOT_SIZE].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_read_fails_fast_with_block_context() {
        let board = DummyBoard::new_default();
        board.set_faults(Faults {
            bad_echo: Some("RDBK".into()),
            ..Default::default()
        });
        let mut cart = cartridge(&board);
        let err = read_cartridge(&mut cart, Slot::new(3).unwrap(), &mut NoProgress).unwrap_err();
        assert!(matches!(err, JobError::Block { block: 192, .. }));
        assert_eq!(board.commands("RDBK").len(), 1);
    }

    #[test]
    fn test_read_reports_progress_per_block() {
        let board = DummyBoard::new_default();
        let mut cart = cartridge(&board);
        let mut recorder = Recorder::default();
        read_cartridge(&mut cart, Slot::new(0).unwrap(), &mut recorder).unwrap();

        assert_eq!(recorder.0.len(), BLOCKS_PER_SLOT + 1);
        assert_eq!(recorder.0[0].completed, 0);
        assert_eq!(recorder.0[BLOCKS_PER_SLOT].completed, BLOCKS_PER_SLOT);
        assert!(recorder.0.iter().all(|p| p.phase == Phase::Read));
    }

    #[test]
    fn test_verify_cartridge() {
        let mut contents = vec![0xFFu8; 0x8000];
        contents[0x4000..0x4000 + 4].copy_from_slice(&[1, 2, 3, 4]);
        contents[0x4004..0x8000].fill(0x00);
        let board = DummyBoard::with_data(DummyConfig::default(), &contents);
        let mut cart = cartridge(&board);
        let slot = Slot::new(1).unwrap();

        verify_cartridge(&mut cart, slot, &[1, 2, 3, 4], &mut NoProgress).unwrap();
        assert!(matches!(
            verify_cartridge(&mut cart, slot, &[1, 2, 3, 5], &mut NoProgress),
            Err(JobError::VerificationFailed {
                first_mismatch: 3,
                mismatches: 1,
                ..
            })
        ));
        assert!(board.commands("WRBK").is_empty());
    }

    #[test]
    fn test_erase_slot() {
        let board = DummyBoard::with_data(DummyConfig::default(), &vec![0u8; 0x10000]);
        let mut cart = cartridge(&board);
        let report = erase_slot(&mut cart, Slot::new(1).unwrap(), &mut NoProgress).unwrap();

        let sectors: Vec<u16> = report.cycles.iter().map(|(s, _)| *s).collect();
        assert_eq!(sectors, vec![4, 5, 6, 7]);
        let flash = board.flash();
        assert!(flash[0x4000..0x8000].iter().all(|&b| b == 0xFF));
        assert!(flash[..0x4000].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_probe_reports_unsupported_chip() {
        let board = DummyBoard::new(DummyConfig {
            chip_response: [0x01, 0x02],
            ..Default::default()
        });
        let mut cart = cartridge(&board);
        let report = probe_board(&mut cart).unwrap();
        assert_eq!(report.board.model, "P2k");
        assert!(!report.chip.is_supported());
    }
}
