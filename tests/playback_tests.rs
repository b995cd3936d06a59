// Integration tests for ordered playback with interrupts

use anyhow::Result;
use talkmate_client::{AudioReply, PlaybackCoordinator};

fn reply(audio: &str) -> AudioReply {
    AudioReply {
        audio: audio.to_string(),
        word_timings: None,
        sample_rate: Some(24000),
        method: None,
    }
}

#[test]
fn test_replies_play_in_arrival_order() -> Result<()> {
    let mut playback = PlaybackCoordinator::new();

    playback.enqueue(reply("QQ=="))?; // "A"
    playback.enqueue(reply("Qg=="))?; // "B"

    let first = playback.next().expect("first reply");
    assert_eq!(first.audio, b"A");
    assert!(playback.finish(first.sequence));

    let second = playback.next().expect("second reply");
    assert_eq!(second.audio, b"B");
    assert!(second.sequence > first.sequence);

    assert!(playback.next().is_none());
    Ok(())
}

#[test]
fn test_three_replies_play_in_arrival_order() -> Result<()> {
    let mut playback = PlaybackCoordinator::new();

    for audio in ["YQ==", "Yg==", "Yw=="] {
        playback.enqueue(reply(audio))?; // "a", "b", "c"
    }

    let mut played = Vec::new();
    while let Some(item) = playback.next() {
        assert!(playback.finish(item.sequence));
        played.push(item.audio);
    }

    assert_eq!(played, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    assert!(playback.is_idle());
    Ok(())
}

#[test]
fn test_interrupt_discards_queued_and_current() -> Result<()> {
    let mut playback = PlaybackCoordinator::new();

    playback.enqueue(reply("QQ=="))?;
    playback.enqueue(reply("Qg=="))?;
    playback.enqueue(reply("Qw=="))?;
    let playing = playback.next().expect("playing reply");

    let discarded = playback.interrupt();
    assert_eq!(discarded, 3, "Two queued plus the one playing");
    assert!(playback.is_idle());
    assert!(!playback.finish(playing.sequence), "Interrupted item cannot finish");

    Ok(())
}

#[test]
fn test_reply_after_interrupt_survives() -> Result<()> {
    let mut playback = PlaybackCoordinator::new();

    playback.enqueue(reply("Qg=="))?;
    playback.interrupt();
    playback.enqueue(reply("QQ=="))?;

    assert_eq!(playback.pending(), 1);
    let item = playback.next().expect("reply after interrupt");
    assert_eq!(item.audio, b"A");

    Ok(())
}

#[test]
fn test_interrupt_on_empty_queue() {
    let mut playback = PlaybackCoordinator::new();

    assert_eq!(playback.interrupt(), 0);
    assert!(playback.is_idle());
}

#[test]
fn test_invalid_base64_is_rejected() {
    let mut playback = PlaybackCoordinator::new();

    assert!(playback.enqueue(reply("not base64!")).is_err());
    assert_eq!(playback.pending(), 0);
}
