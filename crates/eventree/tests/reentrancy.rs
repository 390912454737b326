pub mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use eventree::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, OnceLock};

    #[test]
    fn test_recursive_emit_does_not_grow_stack() {
        const DEPTH: usize = 20_000;

        let ee = Registry::new().get_or_create("deep").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let (c, handle) = (Arc::clone(&calls), ee.clone());
        ee.on("recurse", move |args| {
            let n = *args.get::<usize>(0).unwrap_or(&0);
            c.fetch_add(1, Ordering::SeqCst);
            if n + 1 < DEPTH {
                handle.emit("recurse", args![n + 1])?;
            }
            Ok(())
        })
        .unwrap();

        // A small thread stack makes any per-level frame growth fail loudly.
        let runner = ee.clone();
        std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || runner.emit("recurse", args![0_usize]).unwrap())
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), DEPTH);
    }

    #[test]
    fn test_nested_emit_runs_after_current_round() {
        let ee = Registry::new().root();
        let log = CallLog::new();
        let (l, handle) = (log.clone(), ee.clone());
        ee.on("outer", move |_| {
            l.record("outer:start");
            handle.emit("inner", EventArgs::new())?;
            l.record("outer:end");
            Ok(())
        })
        .unwrap();
        log.attach(&ee, "outer", "outer:second");
        log.attach(&ee, "inner", "inner");

        ee.emit("outer", EventArgs::new()).unwrap();
        assert_eq!(log.calls(), ["outer:start", "outer:end", "outer:second", "inner"]);
    }

    #[test]
    fn test_nested_emits_drain_fifo() {
        let ee = Registry::new().root();
        let log = CallLog::new();
        let handle = ee.clone();
        ee.on("start", move |_| {
            handle.emit("a", EventArgs::new())?;
            handle.emit("b", EventArgs::new())?;
            Ok(())
        })
        .unwrap();
        log.attach(&ee, "a", "a");
        log.attach(&ee, "b", "b");

        ee.emit("start", EventArgs::new()).unwrap();
        assert_eq!(log.calls(), ["a", "b"]);
    }

    #[test]
    fn test_deferred_emit_reports_listeners_at_call_time() {
        let ee = Registry::new().root();
        let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (r, handle) = (Arc::clone(&reported), ee.clone());
        ee.on("start", move |_| {
            r.lock().push(handle.emit("present", EventArgs::new())?);
            r.lock().push(handle.emit("absent", EventArgs::new())?);
            Ok(())
        })
        .unwrap();
        CallLog::new().attach(&ee, "present", "p");

        ee.emit("start", EventArgs::new()).unwrap();
        assert_eq!(*reported.lock(), [true, false]);
    }

    #[test]
    fn test_self_removing_listener_sees_next_round_only() {
        let ee = Registry::new().get_or_create("once").unwrap();
        let log = CallLog::new();
        let this: Arc<OnceLock<Listener>> = Arc::new(OnceLock::new());

        let (l, me, handle) = (log.clone(), Arc::clone(&this), ee.clone());
        let a = Listener::new(move |_| {
            l.record("a");
            if let Some(me) = me.get() {
                handle.remove_listener("foo", me)?;
            }
            handle.emit("foo", EventArgs::new())?;
            Ok(())
        });
        this.set(a.clone()).unwrap();
        ee.add_listener("foo", a).unwrap();
        log.attach(&ee, "foo", "b");

        ee.emit("foo", EventArgs::new()).unwrap();
        assert_eq!(log.count("a"), 1);
        assert_eq!(log.count("b"), 2);
        assert_eq!(ee.listener_count("foo").unwrap(), 1);
    }

    #[test]
    fn test_listener_added_mid_round_joins_next_round() {
        let ee = Registry::new().root();
        let log = CallLog::new();
        let late = log.listener("late");
        let added = Arc::new(AtomicUsize::new(0));

        let (l, a, handle) = (log.clone(), Arc::clone(&added), ee.clone());
        ee.on("foo", move |_| {
            l.record("early");
            if a.fetch_add(1, Ordering::SeqCst) == 0 {
                handle.add_listener("foo", late.clone())?;
                handle.emit("foo", EventArgs::new())?;
            }
            Ok(())
        })
        .unwrap();

        ee.emit("foo", EventArgs::new()).unwrap();
        assert_eq!(log.calls(), ["early", "early", "late"]);
    }

    #[test]
    fn test_error_abandons_queued_rounds() {
        let ee = Registry::new().root();
        let log = CallLog::new();
        let handle = ee.clone();
        ee.on("start", move |_| {
            handle.emit("queued", EventArgs::new())?;
            anyhow::bail!("fails after queueing")
        })
        .unwrap();
        log.attach(&ee, "queued", "queued");

        assert!(ee.emit("start", EventArgs::new()).is_err());
        assert!(log.calls().is_empty(), "queued rounds must not run after a failure");

        // The flow is gone; a fresh emit starts a new one.
        assert!(ee.emit("queued", EventArgs::new()).unwrap());
        assert_eq!(log.calls(), ["queued"]);
    }

    #[test]
    fn test_emit_on_other_emitter_runs_immediately() {
        let registry = Registry::new();
        let (a, b) = (registry.get_or_create("a").unwrap(), registry.get_or_create("b").unwrap());
        let log = CallLog::new();
        let (l, other) = (log.clone(), b.clone());
        a.on("foo", move |_| {
            l.record("a:start");
            other.emit("bar", EventArgs::new())?;
            l.record("a:end");
            Ok(())
        })
        .unwrap();
        log.attach(&b, "bar", "b");

        a.emit("foo", EventArgs::new()).unwrap();
        assert_eq!(log.calls(), ["a:start", "b", "a:end"]);
    }

    #[test]
    fn test_concurrent_flows_are_independent() {
        let ee = Registry::new().get_or_create("shared").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let (c, handle) = (Arc::clone(&calls), ee.clone());
        ee.on("count", move |args| {
            let n = *args.get::<u32>(0).unwrap_or(&0);
            c.fetch_add(1, Ordering::SeqCst);
            if n > 0 {
                handle.emit("count", args![n - 1])?;
            }
            Ok(())
        })
        .unwrap();

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let threads: Vec<_> = (0..2)
            .map(|_| {
                let (ee, barrier) = (ee.clone(), Arc::clone(&barrier));
                std::thread::spawn(move || {
                    barrier.wait();
                    ee.emit("count", args![999_u32]).unwrap()
                })
            })
            .collect();
        for thread in threads {
            assert!(thread.join().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2_000);
    }
}
