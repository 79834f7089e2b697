mod common;

use common::*;
use learner::{
    FitOptions, Hook, HookSet, Interrupt, Learner, LearnerErr, LrFindOptions, Op, Phase, Split,
    callbacks::{DeviceCB, MetricsCB, ProgressCB, RecorderCB},
};

const TRAIN_BATCH: [&str; 7] = [
    "before_batch",
    "after_predict",
    "after_loss",
    "after_backward",
    "after_step",
    "after_batch",
    "cleanup_batch",
];

const VALID_BATCH: [&str; 5] = [
    "before_batch",
    "after_predict",
    "after_loss",
    "after_batch",
    "cleanup_batch",
];

fn count(hooks: &[String], hook: &str) -> usize {
    hooks.iter().filter(|h| *h == hook).count()
}

#[test]
fn one_epoch_fit_dispatches_every_hook_in_order() {
    let log = new_log();
    let mut learn = learner(&[1., 2.], &[3.]);
    learn.add_cb(Rec::new("rec", &log));
    learn.add_cb(MetricsCB::<Mock>::new());
    learn.add_cb(DeviceCB::default());

    learn.fit(1, FitOptions::new()).unwrap();

    let mut expected = vec!["before_fit", "before_epoch"];
    expected.extend(TRAIN_BATCH);
    expected.extend(TRAIN_BATCH);
    expected.extend(["after_epoch", "cleanup_epoch", "before_epoch"]);
    expected.extend(VALID_BATCH);
    expected.extend(["after_epoch", "cleanup_epoch", "after_fit", "cleanup_fit"]);

    assert_eq!(hooks_of(&log, "rec"), expected);

    let metrics = learn.state().metrics.clone().unwrap();
    assert_eq!(metrics.split, Split::Test);
    assert_eq!(metrics.loss, 3.);
}

#[test]
fn metrics_publish_one_summary_per_epoch() {
    let mut learn = learner(&[1., 2.], &[3., 5.]);
    let metrics = MetricsCB::<Mock>::new();
    let history = metrics.history();
    learn.add_cb(metrics);

    learn.fit(2, FitOptions::new()).unwrap();

    let history = history.borrow();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].split, Split::Train);
    assert_eq!(history[0].loss, 1.5);
    assert_eq!(history[3].epoch, 1);
    assert_eq!(history[3].loss, 4.);
}

#[test]
fn progress_runs_after_metrics_whatever_the_registration() {
    let mut learn = learner(&[1., 3.], &[2.]);
    let progress = ProgressCB::new(1);
    let curves = progress.curves();
    learn.add_cb(progress);
    learn.add_cb(MetricsCB::<Mock>::new());

    learn.fit(2, FitOptions::new()).unwrap();

    let curves = curves.borrow();
    assert_eq!(curves.train, [1., 3., 1., 3.]);
    assert_eq!(curves.valid, [2., 2.]);
}

#[test]
fn batch_cancel_only_ends_that_batch() {
    let log = new_log();
    let mut learn = learner(&[1., 2.], &[3.]);
    learn.add_cb(Rec::new("rec", &log).react(|hook, learn| {
        if hook == Hook::AfterPredict && learn.training() && learn.iter == 0 {
            return Err(Interrupt::CancelBatch);
        }
        Ok(())
    }));

    learn.fit(1, FitOptions::new()).unwrap();

    let hooks = hooks_of(&log, "rec");
    assert_eq!(hooks[2..5], ["before_batch", "after_predict", "cleanup_batch"]);
    assert_eq!(count(&hooks, "after_loss"), 2);
    assert_eq!(count(&hooks, "cleanup_batch"), 3);
    assert_eq!(count(&hooks, "after_epoch"), 2);
    assert_eq!(count(&hooks, "after_fit"), 1);
}

#[test]
fn epoch_cancel_moves_on_to_validation() {
    let log = new_log();
    let mut learn = learner(&[1., 2.], &[3.]);
    learn.add_cb(Rec::new("rec", &log).react(|hook, learn| {
        if hook == Hook::AfterBatch && learn.training() {
            return Err(Interrupt::CancelEpoch);
        }
        Ok(())
    }));

    learn.fit(1, FitOptions::new()).unwrap();

    let hooks = hooks_of(&log, "rec");
    assert_eq!(count(&hooks, "before_epoch"), 2);
    assert_eq!(count(&hooks, "after_epoch"), 1);
    assert_eq!(count(&hooks, "cleanup_epoch"), 2);
    assert_eq!(count(&hooks, "before_batch"), 2);
    assert_eq!(learn.state().split, Split::Test);
}

#[test]
fn fit_cancel_unwinds_through_every_cleanup() {
    let log = new_log();
    let mut learn = learner(&[1., 2.], &[3.]);
    learn.add_cb(Rec::new("rec", &log).react(|hook, _| match hook {
        Hook::AfterBatch => Err(Interrupt::CancelFit),
        _ => Ok(()),
    }));

    learn.fit(3, FitOptions::new()).unwrap();

    let mut expected = vec!["before_fit", "before_epoch"];
    expected.extend(TRAIN_BATCH);
    expected.extend(["cleanup_epoch", "cleanup_fit"]);
    assert_eq!(hooks_of(&log, "rec"), expected);
}

#[test]
fn failure_unwinds_through_every_cleanup() {
    let log = new_log();
    let mut learn = learner(&[1., 2.], &[3.]);
    learn.add_cb(Rec::new("rec", &log).react(|hook, _| match hook {
        Hook::AfterLoss => Err(custom("boom").into()),
        _ => Ok(()),
    }));

    let err = learn.fit(1, FitOptions::new()).unwrap_err();

    assert!(matches!(err, LearnerErr::Custom(msg) if msg == "boom"));
    let hooks = hooks_of(&log, "rec");
    assert_eq!(
        hooks[hooks.len() - 3..],
        ["cleanup_batch", "cleanup_epoch", "cleanup_fit"]
    );
    assert_eq!(count(&hooks, "after_batch"), 0);
    assert_eq!(count(&hooks, "after_fit"), 0);
}

#[test]
fn failing_cleanup_replaces_the_failure() {
    let mut learn = learner(&[1.], &[]);
    learn.add_cb(Rec::new("rec", &new_log()).react(|hook, _| match hook {
        Hook::AfterBatch => Err(custom("boom").into()),
        Hook::CleanupEpoch => Err(custom("cleanup").into()),
        _ => Ok(()),
    }));

    let err = learn.fit(1, FitOptions::new()).unwrap_err();
    assert!(matches!(err, LearnerErr::Custom(msg) if msg == "cleanup"));
}

#[test]
fn signal_raised_outside_its_phase_is_an_error() {
    let mut learn = learner(&[1.], &[1.]);
    learn.add_cb(Rec::new("rec", &new_log()).react(|hook, _| match hook {
        Hook::BeforeFit => Err(Interrupt::CancelBatch),
        _ => Ok(()),
    }));

    let err = learn.fit(1, FitOptions::new()).unwrap_err();
    assert!(matches!(err, LearnerErr::UncaughtSignal(Phase::Batch)));
}

#[test]
fn fit_callbacks_are_removed_afterwards() {
    let log = new_log();
    let mut learn = learner(&[1.], &[1.]);
    learn.add_cb(Rec::new("kept", &log).hooks(HookSet::of(&[Hook::BeforeFit])));

    learn
        .fit(1, FitOptions::new().cb(Rec::new("extra", &log)))
        .unwrap();
    assert_eq!(learn.callbacks().names(), ["kept"]);

    let failing = Rec::new("extra", &log).react(|hook, _| match hook {
        Hook::BeforeEpoch => Err(custom("boom").into()),
        _ => Ok(()),
    });
    assert!(learn.fit(1, FitOptions::new().cb(failing)).is_err());
    assert_eq!(learn.callbacks().names(), ["kept"]);

    log.borrow_mut().clear();
    learn.fit(1, FitOptions::new()).unwrap();
    assert_eq!(*log.borrow(), ["kept:before_fit"]);
}

#[test]
fn missing_operation_is_unsupported() {
    let mut learn = Learner::<Mock>::new(MockModel::default(), data(&[1.], &[]), (), 0.1);

    let err = learn.fit(1, FitOptions::new()).unwrap_err();
    assert!(matches!(err, LearnerErr::Unsupported(Op::Predict)));
}

#[test]
fn callbacks_take_precedence_over_the_specialization() {
    let mut learn = learner(&[1.], &[]);
    let recorder = RecorderCB::<Mock>::new().with("loss", |learn| learn.loss());
    let records = recorder.records();
    learn.add_cb(recorder);
    let id = learn.add_cb(
        Rec::new("pred", &new_log())
            .hooks(HookSet::of(&[Hook::Predict]))
            .react(|_, learn| {
                learn.preds = Some(10.);
                Ok(())
            }),
    );

    learn.fit(1, FitOptions::new().valid(false)).unwrap();
    assert_eq!(records.borrow()["loss"], [10.]);

    learn.remove_cb(id);
    learn.fit(1, FitOptions::new().valid(false)).unwrap();
    assert_eq!(records.borrow()["loss"], [1.]);
}

#[test]
fn plain_learner_runs_on_callbacks_alone() {
    let mut learn = Learner::<Mock>::new(MockModel::default(), data(&[4.], &[]), (), 0.1);
    let recorder = RecorderCB::<Mock>::new().with("loss", |learn| learn.loss());
    let records = recorder.records();
    learn.add_cb(recorder);
    learn.add_cb(
        Rec::new("ops", &new_log())
            .hooks(HookSet::of(&[
                Hook::Predict,
                Hook::GetLoss,
                Hook::Backward,
                Hook::Step,
                Hook::ZeroGrad,
            ]))
            .react(|hook, learn| {
                match hook {
                    Hook::Predict => learn.preds = Some(learn.batch()?.0),
                    Hook::GetLoss => learn.loss = Some(learn.preds()? * 2.),
                    _ => {}
                }
                Ok(())
            }),
    );

    learn.fit(1, FitOptions::new().valid(false)).unwrap();
    assert_eq!(records.borrow()["loss"], [8.]);
}

#[test]
fn each_fit_builds_its_optimizer() {
    let mut learn = learner(&[1.], &[]);

    learn.fit(1, FitOptions::new()).unwrap();
    assert_eq!(learn.state().opt, Some(MockOpt { lr: 0.1 }));

    learn.fit(1, FitOptions::new().lr(0.5)).unwrap();
    assert_eq!(learn.state().opt, Some(MockOpt { lr: 0.5 }));
}

#[test]
fn validation_turns_gradients_off_and_back_on() {
    let mut learn = learner(&[1.], &[2.]);
    learn.fit(2, FitOptions::new()).unwrap();

    let model = &learn.state().model;
    assert_eq!(model.grad_toggles, [false, true, false, true]);
    assert!(model.grad_enabled);
}

#[test]
fn validation_restores_the_previous_gradient_setting() {
    let mut learn = learner(&[1.], &[2.]);
    learn.state_mut().model.grad_enabled = false;

    learn.fit(1, FitOptions::new().train(false)).unwrap();

    let model = &learn.state().model;
    assert_eq!(model.grad_toggles, [false, false]);
    assert!(!model.grad_enabled);
}

#[test]
fn batch_values_do_not_outlive_their_batch() {
    let seen = new_log();
    let mut learn = learner(&[1., 2.], &[3.]);
    let sink = seen.clone();
    learn.add_cb(
        Rec::new("rec", &new_log())
            .hooks(HookSet::of(&[
                Hook::BeforeEpoch,
                Hook::AfterBatch,
                Hook::AfterEpoch,
                Hook::AfterFit,
            ]))
            .react(move |hook, learn| {
                let batch = learn.batch().is_ok();
                let preds = learn.preds().is_ok();
                let loss = learn.loss().is_ok();
                sink.borrow_mut().push(format!("{hook}:{batch}/{preds}/{loss}"));
                Ok(())
            }),
    );

    learn.fit(1, FitOptions::new()).unwrap();

    assert_eq!(
        *seen.borrow(),
        [
            "before_epoch:false/false/false",
            "after_batch:true/true/true",
            "after_batch:true/true/true",
            "after_epoch:false/false/false",
            "before_epoch:false/false/false",
            "after_batch:true/true/true",
            "after_epoch:false/false/false",
            "after_fit:false/false/false",
        ]
    );

    let state = learn.state();
    assert!(matches!(state.batch(), Err(LearnerErr::MissingState("batch"))));
    assert!(matches!(state.loss(), Err(LearnerErr::MissingState("loss"))));
}

#[test]
fn cancelled_batch_leaves_nothing_behind() {
    let mut learn = learner(&[1.], &[]);
    learn.add_cb(Rec::new("rec", &new_log()).react(|hook, _| match hook {
        Hook::AfterLoss => Err(Interrupt::CancelFit),
        _ => Ok(()),
    }));

    learn.fit(1, FitOptions::new()).unwrap();
    assert!(learn.state().loss().is_err());
    assert!(learn.state().preds().is_err());
}

#[test]
fn training_only_fit_skips_validation() {
    let log = new_log();
    let mut learn = learner(&[1., 2.], &[3.]);
    learn.add_cb(Rec::new("rec", &log).hooks(HookSet::of(&[Hook::BeforeEpoch])));

    learn.fit(3, FitOptions::new().valid(false)).unwrap();

    assert_eq!(hooks_of(&log, "rec").len(), 3);
    assert!(learn.state().model.grad_toggles.is_empty());
}

#[test]
fn one_epoch_hands_back_foreign_signals() {
    let mut learn = learner(&[1., 2.], &[]);
    learn.add_cb(Rec::new("rec", &new_log()).react(|hook, _| match hook {
        Hook::AfterStep => Err(Interrupt::CancelFit),
        _ => Ok(()),
    }));

    assert!(matches!(learn.one_epoch(true), Err(Interrupt::CancelFit)));
}

#[test]
fn lr_find_stops_once_the_loss_blows_up() {
    let mut learn = learner(&[1., 1.5, 3., 0.5], &[9.]);
    let opts = LrFindOptions {
        gamma: 2.,
        max_mult: 2.,
        start_lr: 0.01,
        max_epochs: 5,
    };

    let history = learn.lr_find(opts).unwrap();

    let lrs: Vec<_> = history.iter().map(|p| p.lr).collect();
    let losses: Vec<_> = history.iter().map(|p| p.loss).collect();
    assert_eq!(lrs, [0.01, 0.02, 0.04]);
    assert_eq!(losses, [1., 1.5, 3.]);
    assert!(learn.callbacks().is_empty());
}

#[test]
fn lr_find_skips_validation_and_runs_out_of_epochs() {
    let log = new_log();
    let mut learn = learner(&[1., 1.], &[5., 5.]);
    learn.add_cb(Rec::new("rec", &log).hooks(HookSet::of(&[Hook::AfterEpoch])));

    let history = learn.lr_find(LrFindOptions::default()).unwrap();

    assert_eq!(history.len(), 20);
    assert!(history.windows(2).all(|w| w[1].lr > w[0].lr));
    assert_eq!(hooks_of(&log, "rec").len(), 10);
}

#[test]
fn lr_find_needs_an_optimizer() {
    let mut learn = Learner::<Mock, MockSteps>::specialized(
        MockModel::default(),
        data(&[1.], &[]),
        (),
        0.1,
        MockSteps,
    );

    let err = learn.lr_find(LrFindOptions::default()).unwrap_err();
    assert!(matches!(err, LearnerErr::MissingState("opt")));
}

#[test]
fn recorder_follows_the_optimizer() {
    let mut learn = learner(&[2., 4.], &[1.]);
    let recorder = RecorderCB::<Mock>::lr_and_loss();
    let records = recorder.records();
    learn.add_cb(recorder);

    learn.fit(1, FitOptions::new().lr(0.3)).unwrap();

    let records = records.borrow();
    assert_eq!(records["lr"], [0.3, 0.3]);
    assert_eq!(records["loss"], [2., 4.]);
}
