use std::thread;
use std::time::{Duration, Instant};
use tuitty_dispatch::{
    Color, Config, Coord, Dispatcher, Effects, Error, Event, HandleState, Key, LockPolicy, Mode,
    Mouse, MouseButton, Style, VirtualConsole, VirtualDevice,
};

const WAIT: Duration = Duration::from_secs(2);

fn setup() -> (Dispatcher, VirtualConsole) {
    let (dev, console) = VirtualDevice::new(80, 24);
    (Dispatcher::new(dev).unwrap(), console)
}

fn wait_for(mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < WAIT, "timed out");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn two_handles_see_the_same_events() {
    let (disp, console) = setup();
    disp.raw().unwrap();
    assert_eq!(console.mode(), Mode::Raw);
    let mut a = disp.listen().unwrap();
    let mut b = disp.spawn().unwrap();

    console.send_input(b"\x1B[A\x1B[A\r");
    let expected = vec![Event::Key(Key::Up), Event::Key(Key::Up), Event::Key(Key::Enter)];

    let got_b = thread::spawn(move || (0..3).map(|_| b.poll_sync().unwrap()).collect::<Vec<_>>());
    let got_a: Vec<_> = (0..3).map(|_| a.poll_sync().unwrap()).collect();
    assert_eq!(got_a, expected);
    assert_eq!(a.poll_async().unwrap(), None);
    assert_eq!(got_b.join().unwrap(), expected);
}

#[test]
fn handle_only_sees_later_events() {
    let (disp, console) = setup();
    let mut a = disp.listen().unwrap();
    console.send_input(b"x");
    assert_eq!(a.poll_sync().unwrap(), Event::Key(Key::Char('x')));

    let mut b = disp.listen().unwrap();
    console.send_input(b"y");
    assert_eq!(b.poll_sync().unwrap(), Event::Key(Key::Char('y')));
    assert_eq!(a.poll_sync().unwrap(), Event::Key(Key::Char('y')));
    assert_eq!(b.poll_async().unwrap(), None);
}

#[test]
fn escape_and_split_sequences() {
    let (disp, console) = setup();
    let mut h = disp.listen().unwrap();
    console.send_input(b"\x1B");
    assert_eq!(h.poll_timeout(WAIT).unwrap(), Some(Event::Key(Key::Esc)));

    console.send_input(b"\x1B[");
    console.send_input(b"B");
    assert_eq!(h.poll_timeout(WAIT).unwrap(), Some(Event::Key(Key::Down)));

    disp.enable_mouse().unwrap();
    assert!(console.mouse_capture());
    console.send_input(b"\x1B[<0;5;3M\x1B[<0;5;3m");
    assert_eq!(
        h.poll_sync().unwrap(),
        Event::Mouse(Mouse::Press(MouseButton::Left, Coord::new(4, 2)))
    );
    assert_eq!(
        h.poll_sync().unwrap(),
        Event::Mouse(Mouse::Release(Coord::new(4, 2)))
    );
}

#[test]
fn lock_round_trip_keeps_handle_active() {
    let (disp, _console) = setup();
    let a = disp.listen().unwrap();
    let b = disp.listen().unwrap();
    assert_eq!(a.state(), HandleState::Active);
    a.lock().unwrap();
    assert_eq!(a.state(), HandleState::Locked);
    assert_eq!(disp.lock_holder(), Some(a.id()));
    match b.lock() {
        Err(Error::LockHeld { holder }) => assert_eq!(holder, a.id()),
        other => panic!("unexpected {:?}", other),
    }
    // Advisory: others may still draw
    b.goto(1, 1).unwrap();
    a.unlock().unwrap();
    assert_eq!(a.state(), HandleState::Active);
    assert_eq!(disp.lock_holder(), None);
    a.goto(2, 2).unwrap();
}

#[test]
fn exclusive_lock_holds_off_other_handles() {
    let (dev, console) = VirtualDevice::new(80, 24);
    let config = Config::default().with_lock_policy(LockPolicy::Exclusive);
    let disp = Dispatcher::with_config(dev, config).unwrap();
    let mut a = disp.listen().unwrap();
    let mut b = disp.listen().unwrap();
    a.lock().unwrap();

    assert!(matches!(b.goto(1, 1), Err(Error::Locked { holder }) if holder == a.id()));
    assert!(matches!(b.raw(), Err(Error::Locked { .. })));
    a.goto(1, 1).unwrap();
    disp.goto(2, 2).unwrap();

    console.send_input(b"q");
    assert_eq!(a.poll_sync().unwrap(), Event::Key(Key::Char('q')));
    assert_eq!(b.poll_timeout(Duration::from_millis(50)).unwrap(), None);

    a.unlock().unwrap();
    b.goto(3, 3).unwrap();
    console.send_input(b"r");
    assert_eq!(b.poll_sync().unwrap(), Event::Key(Key::Char('r')));
}

#[test]
fn no_output_from_others_once_lock_is_taken() {
    let (dev, console) = VirtualDevice::new(80, 24);
    let config = Config::default().with_lock_policy(LockPolicy::Exclusive);
    let disp = Dispatcher::with_config(dev, config).unwrap();
    let a = disp.listen().unwrap();
    let b = disp.listen().unwrap();
    let writer = thread::spawn(move || loop {
        match b.printf("b") {
            Ok(()) => (),
            Err(Error::Locked { .. }) => break,
            Err(e) => panic!("unexpected {:?}", e),
        }
    });
    wait_for(|| console.write_count() > 10);
    a.lock().unwrap();
    console.take_output();
    writer.join().unwrap();
    assert!(console.output().is_empty());
}

#[test]
fn paused_handle_misses_events() {
    let (disp, console) = setup();
    let mut h = disp.listen().unwrap();
    let mut other = disp.listen().unwrap();
    h.pause().unwrap();
    assert!(h.is_paused().unwrap());
    console.send_input(b"a");
    assert_eq!(other.poll_sync().unwrap(), Event::Key(Key::Char('a')));

    h.resume().unwrap();
    assert!(!h.is_paused().unwrap());
    console.send_input(b"b");
    assert_eq!(h.poll_sync().unwrap(), Event::Key(Key::Char('b')));
    h.stop().unwrap();
    assert!(matches!(h.is_paused(), Err(Error::Closed)));
    assert!(matches!(h.pause(), Err(Error::Closed)));
}

#[test]
fn goto_outside_terminal_is_rejected() {
    let (disp, _console) = setup();
    disp.goto(5, 5).unwrap();
    match disp.goto(10, 24) {
        Err(Error::InvalidCoordinate { row: 24, height: 24, .. }) => (),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(disp.coord().unwrap(), Coord::new(5, 5));
}

#[test]
fn switch_and_back_restores_mark() {
    let (disp, console) = setup();
    disp.goto(3, 4).unwrap();
    let id = disp.switch().unwrap();
    assert_eq!(id, 1);
    assert_eq!(disp.screen().unwrap(), 1);
    assert!(console.alt_screen());
    disp.goto(10, 10).unwrap();
    disp.switch_to(0).unwrap();
    assert_eq!(disp.coord().unwrap(), Coord::new(3, 4));
    assert!(!console.alt_screen());
    assert!(matches!(disp.switch_to(9), Err(Error::UnknownScreen(9))));

    disp.switch_to(1).unwrap();
    assert_eq!(disp.coord().unwrap(), Coord::new(10, 10));
    disp.to_main().unwrap();
    assert_eq!(disp.screen().unwrap(), 0);
    let snap = disp.snapshot().unwrap();
    assert_eq!(snap.screens().len(), 2);
    assert_eq!(snap.mark(1), Some(Coord::new(10, 10)));
}

#[test]
fn new_screen_starts_cooked_without_mouse() {
    let (disp, console) = setup();
    disp.raw().unwrap();
    disp.enable_mouse().unwrap();
    disp.switch().unwrap();
    assert_eq!(disp.mode().unwrap(), Mode::Cooked);
    assert!(!disp.snapshot().unwrap().mouse_enabled());
    assert_eq!(console.mode(), Mode::Cooked);
    assert!(!console.mouse_capture());

    disp.to_main().unwrap();
    assert_eq!(console.mode(), Mode::Raw);
    assert!(console.mouse_capture());
}

#[test]
fn terminal_gets_the_style_the_session_records() {
    let (disp, console) = setup();
    disp.set_styles(Color::Red, Color::Blue, Effects::default()).unwrap();
    disp.flush().unwrap();
    assert_eq!(console.take_output(), b"\x1B[0m\x1B[38;5;9m\x1B[48;5;12m");

    disp.set_fx(Effects::UNDERLINE).unwrap();
    disp.set_fx(Effects::BOLD).unwrap();
    disp.flush().unwrap();
    assert_eq!(
        console.take_output(),
        [
            &b"\x1B[0m\x1B[38;5;9m\x1B[48;5;12m\x1B[4m"[..],
            b"\x1B[0m\x1B[38;5;9m\x1B[48;5;12m\x1B[1m",
        ]
        .concat()
    );
    assert_eq!(
        disp.style().unwrap(),
        Style {
            fg: Color::Red,
            bg: Color::Blue,
            fx: Effects::BOLD,
        }
    );
}

#[test]
fn style_round_trip() {
    let (disp, _console) = setup();
    let h = disp.listen().unwrap();
    h.set_fg(Color::DarkCyan).unwrap();
    h.set_bg(Color::AnsiValue(17)).unwrap();
    h.set_fx(Effects::UNDERLINE | Effects::REVERSE).unwrap();
    let expected = Style {
        fg: Color::DarkCyan,
        bg: Color::AnsiValue(17),
        fx: Effects::UNDERLINE | Effects::REVERSE,
    };
    assert_eq!(h.style().unwrap(), expected);
    assert_eq!(disp.style().unwrap(), expected);
    h.reset_styles().unwrap();
    assert_eq!(disp.style().unwrap(), Style::default());
}

#[test]
fn flush_sends_buffered_commands_in_one_write() {
    let (disp, console) = setup();
    let h = disp.listen().unwrap();
    h.goto(0, 2).unwrap();
    h.set_fg(Color::Red).unwrap();
    h.prints("menu").unwrap();
    disp.down(1).unwrap();
    assert_eq!(disp.coord().unwrap(), Coord::new(4, 3));
    assert_eq!(console.write_count(), 0);
    h.flush().unwrap();
    assert_eq!(console.write_count(), 1);
    assert_eq!(console.take_output(), b"\x1B[3;1H\x1B[38;5;9mmenu\x1B[1B");
    h.printf("!").unwrap();
    assert_eq!(console.take_output(), b"!");
}

#[test]
fn concurrent_output_is_not_interleaved() {
    let (disp, console) = setup();
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let h = disp.spawn().unwrap();
            thread::spawn(move || {
                for j in 0..50 {
                    h.printf(&format!("[{}:{}]", i, j)).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    let out = String::from_utf8(console.output()).unwrap();
    for i in 0..4 {
        for j in 0..50 {
            assert!(out.contains(&format!("[{}:{}]", i, j)));
        }
    }
    assert_eq!(console.write_count(), 200);
}

#[test]
fn closed_handle_and_dispatcher_report_errors() {
    let (disp, _console) = setup();
    let mut a = disp.listen().unwrap();
    let mut b = disp.listen().unwrap();
    a.lock().unwrap();
    a.stop().unwrap();
    assert_eq!(a.state(), HandleState::Closed);
    assert!(matches!(a.poll_async(), Err(Error::Closed)));
    assert!(matches!(a.goto(0, 0), Err(Error::Closed)));
    assert!(matches!(a.stop(), Err(Error::Closed)));
    // Stopping released the lock and left b alone
    assert_eq!(disp.lock_holder(), None);
    assert_eq!(b.poll_async().unwrap(), None);

    drop(disp);
    assert_eq!(b.state(), HandleState::Closed);
    assert!(matches!(b.poll_async(), Err(Error::Shutdown)));
    assert!(matches!(b.goto(0, 0), Err(Error::Shutdown)));
}

#[test]
fn device_failure_ends_the_session() {
    let (disp, console) = setup();
    let mut h = disp.listen().unwrap();
    disp.prints("x").unwrap();
    console.hang_up();
    assert!(matches!(disp.flush(), Err(Error::Device(_))));
    assert!(matches!(disp.goto(0, 0), Err(Error::SessionFailed(_))));
    assert!(matches!(h.goto(0, 0), Err(Error::SessionFailed(_))));
    assert!(matches!(h.poll_sync(), Err(Error::SessionFailed(_))));
    assert!(matches!(disp.listen(), Err(Error::SessionFailed(_))));
    assert!(disp.shutdown().is_ok());
}

#[test]
fn input_hang_up_ends_the_session() {
    let (dev, console) = VirtualDevice::new(80, 24);
    let disp = Dispatcher::new(dev).unwrap();
    let mut h = disp.listen().unwrap();
    drop(console);
    assert!(matches!(h.poll_sync(), Err(Error::SessionFailed(_))));
    assert!(matches!(disp.raw(), Err(Error::SessionFailed(_))));
}

#[test]
fn resize_updates_size() {
    let (disp, console) = setup();
    assert_eq!(disp.size().unwrap(), (80, 24));
    console.resize(100, 40);
    wait_for(|| disp.size().unwrap() == (100, 40));
    disp.goto(99, 39).unwrap();
}

#[test]
fn sync_pos_from_device_or_report() {
    let (dev, console) = VirtualDevice::new(80, 24);
    let config = Config::default().with_report_timeout(Duration::from_millis(50));
    let disp = Dispatcher::with_config(dev, config).unwrap();

    console.set_cursor(Some(Coord::new(2, 3)));
    assert_eq!(disp.sync_pos().unwrap(), Coord::new(2, 3));
    assert_eq!(disp.coord().unwrap(), Coord::new(2, 3));

    console.set_cursor(None);
    assert!(matches!(disp.sync_pos(), Err(Error::ReportTimeout)));
    assert_eq!(console.mode(), Mode::Cooked);
}

#[test]
fn sync_pos_reads_in_band_report() {
    let (disp, console) = setup();
    let mut h = disp.listen().unwrap();
    let term = console.clone();
    let responder = thread::spawn(move || {
        wait_for(|| term.output().ends_with(b"\x1B[6n"));
        term.send_input(b"\x1B[5;10R");
    });
    assert_eq!(h.sync_pos().unwrap(), Coord::new(9, 4));
    responder.join().unwrap();
    assert_eq!(disp.coord().unwrap(), Coord::new(9, 4));
    assert_eq!(console.mode(), Mode::Cooked);
    // The report is not an event
    assert_eq!(h.poll_timeout(Duration::from_millis(50)).unwrap(), None);
}

#[test]
fn drop_restores_terminal() {
    let (disp, console) = setup();
    disp.raw().unwrap();
    disp.enable_mouse().unwrap();
    disp.hide_cursor().unwrap();
    disp.switch().unwrap();
    disp.set_fx(Effects::BOLD).unwrap();
    drop(disp);
    assert_eq!(console.mode(), Mode::Cooked);
    assert!(!console.alt_screen());
    assert!(!console.mouse_capture());
    assert!(console.cursor_visible());
    assert!(console.output().ends_with(b"\x1B[0m"));
}
