use stakker::{actor, fwd_do, ret_nop, Stakker};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tuitty_dispatch::{Dispatcher, Event, Key, Listener, VirtualDevice};

#[test]
fn listener_forwards_events_in_order() {
    let (dev, console) = VirtualDevice::new(80, 24);
    let disp = Dispatcher::new(dev).unwrap();
    let handle = disp.listen().unwrap();

    let start = Instant::now();
    let mut stakker = Stakker::new(start);
    let s = &mut stakker;
    let got = Rc::new(RefCell::new(Vec::new()));
    let got2 = got.clone();
    let output = fwd_do!(move |ev: Event| got2.borrow_mut().push(ev));
    let _listener = actor!(
        s,
        Listener::init(handle, output, Duration::from_millis(5)),
        ret_nop!()
    );

    console.send_input(b"\x1B[Bq\r");
    while got.borrow().len() < 3 {
        assert!(start.elapsed() < Duration::from_secs(2), "timed out");
        std::thread::sleep(Duration::from_millis(5));
        s.run(Instant::now(), false);
    }
    assert_eq!(
        *got.borrow(),
        vec![
            Event::Key(Key::Down),
            Event::Key(Key::Char('q')),
            Event::Key(Key::Enter)
        ]
    );
}
