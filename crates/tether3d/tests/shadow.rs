use anyhow::Context;
use approx::assert_relative_eq;
use tether3d::math::{GameVector, QAngle};
use tether3d::{
    CallbackFlags, CollisionModel, Environment, EnvironmentConfig, ObjectHandle, ObjectParams, ShadowState,
};

fn setup() -> anyhow::Result<(Environment, ObjectHandle)> {
    let config = EnvironmentConfig {
        gravity: GameVector::zeros(),
        ..EnvironmentConfig::default()
    };
    let mut env = Environment::new(config)?;
    let params = ObjectParams {
        damping: 0.0,
        rot_damping: 0.0,
        drag_coefficient: 0.0,
        ..ObjectParams::default()
    };
    let model = CollisionModel::cuboid(GameVector::new(4.0, 4.0, 4.0))?;
    let handle = env.create_object(&model, 0, &GameVector::zeros(), &QAngle::zero(), &params, false);
    Ok((env, handle))
}

#[test]
fn far_targets_are_reached_by_teleporting() -> anyhow::Result<()> {
    let (mut env, handle) = setup()?;
    let shadow = env.set_shadow(handle, 100.0, 360.0, true, true)?;
    env.shadow_mut(shadow)
        .context("missing shadow")?
        .set_teleport_distance(50.0);

    let target = GameVector::new(1000.0, 0.0, 0.0);
    env.update_shadow(handle, &target, &QAngle::zero(), 0.0)?;
    assert_eq!(env.shadow(shadow).context("missing shadow")?.state(), ShadowState::Teleporting);

    env.step();

    assert_eq!(env.shadow(shadow).context("missing shadow")?.state(), ShadowState::Tracking);
    let body = env.object(handle).context("missing object")?;
    assert_relative_eq!(body.position().0, target, epsilon = 1.0e-2);
    assert_relative_eq!(body.velocity().0, GameVector::zeros(), epsilon = 1.0e-3);
    Ok(())
}

#[test]
fn tracking_speed_is_bounded() -> anyhow::Result<()> {
    let (mut env, handle) = setup()?;
    let shadow = env.set_shadow(handle, 50.0, 90.0, true, false)?;
    env.update_shadow(handle, &GameVector::new(1000.0, 0.0, 0.0), &QAngle::zero(), 0.0)?;
    assert_eq!(env.shadow(shadow).context("missing shadow")?.state(), ShadowState::Tracking);

    env.step();

    let controller = env.shadow(shadow).context("missing shadow")?;
    assert_relative_eq!(controller.last_impulse(), GameVector::new(50.0, 0.0, 0.0), max_relative = 1.0e-3);
    assert_eq!(controller.ticks_since_update(), 1);

    let (velocity, _) = env.object(handle).context("missing object")?.velocity();
    assert!(velocity.x <= 50.0 + 1.0e-2, "too fast: {}", velocity.x);
    assert!(velocity.x > 49.0, "too slow: {}", velocity.x);

    let (position, _, ticks) = env.shadow_position(handle).context("not shadowed")?;
    assert!(position.x > 0.0);
    assert_eq!(ticks, 1);
    Ok(())
}

#[test]
fn targets_within_teleport_distance_are_tracked() -> anyhow::Result<()> {
    let (mut env, handle) = setup()?;
    let shadow = env.set_shadow(handle, 100.0, 360.0, true, true)?;
    env.shadow_mut(shadow)
        .context("missing shadow")?
        .set_teleport_distance(50.0);

    env.update_shadow(handle, &GameVector::new(20.0, 0.0, 0.0), &QAngle::zero(), 0.0)?;
    assert_eq!(env.shadow(shadow).context("missing shadow")?.state(), ShadowState::Tracking);

    env.step();

    let body = env.object(handle).context("missing object")?;
    let (velocity, _) = body.velocity();
    assert!(velocity.x > 0.0, "not moving: {velocity:?}");
    assert!(velocity.norm() <= 100.0 + 1.0e-2, "too fast: {velocity:?}");
    let (position, _) = body.position();
    assert!(position.x > 0.0 && position.x < 20.0, "position {position:?}");
    Ok(())
}

#[test]
fn close_targets_are_reached_without_overshoot() -> anyhow::Result<()> {
    let (mut env, handle) = setup()?;
    let shadow = env.set_shadow(handle, 1000.0, 360.0, true, true)?;
    let target = GameVector::new(2.0, 0.0, 0.0);
    env.update_shadow(handle, &target, &QAngle::zero(), 0.0)?;

    for _ in 0..5 {
        env.step();
    }

    assert_eq!(env.shadow(shadow).context("missing shadow")?.state(), ShadowState::Tracking);
    let (position, _) = env.object(handle).context("missing object")?.position();
    assert_relative_eq!(position, target, epsilon = 0.05);
    Ok(())
}

#[test]
fn detaching_restores_callback_flags() -> anyhow::Result<()> {
    let (mut env, handle) = setup()?;
    let before = env.object(handle).context("missing object")?.callback_flags();

    let shadow = env.set_shadow(handle, 100.0, 360.0, true, true)?;
    let during = env.object(handle).context("missing object")?.callback_flags();
    assert!(during.contains(CallbackFlags::SHADOW_COLLISION));
    assert!(!during.contains(CallbackFlags::GLOBAL_FRICTION));
    assert!(!during.contains(CallbackFlags::GLOBAL_COLLIDE_STATIC));

    // Reconfiguring keeps the same controller.
    assert_eq!(env.set_shadow(handle, 10.0, 10.0, false, false)?, shadow);
    assert_relative_eq!(env.shadow(shadow).context("missing shadow")?.max_speed().0, 10.0, max_relative = 1.0e-4);

    env.remove_shadow_controller(handle)?;
    let object = env.object(handle).context("missing object")?;
    assert_eq!(object.callback_flags(), before);
    assert!(object.shadow_controller().is_none());
    assert!(env.shadow(shadow).is_none());
    Ok(())
}

#[test]
fn shadow_material_is_swapped_and_restored() -> anyhow::Result<()> {
    let (mut env, handle) = setup()?;
    let shadow_index = env.surfaces().shadow_index();
    let shadow = env.set_shadow(handle, 100.0, 360.0, true, true)?;

    {
        let mut controller = env.shadow_mut(shadow).context("missing shadow")?;
        controller.use_shadow_material(true);
        assert!(controller.is_using_shadow_material());
        assert_eq!(controller.body().material_index(), shadow_index);

        controller.use_shadow_material(false);
        assert_eq!(controller.body().material_index(), 0);

        controller.use_shadow_material(true);
    }

    env.remove_shadow_controller(handle)?;
    assert_eq!(env.object(handle).context("missing object")?.material_index(), 0);
    Ok(())
}

#[test]
fn step_up_raises_the_object() -> anyhow::Result<()> {
    let (mut env, handle) = setup()?;
    let shadow = env.set_shadow(handle, 100.0, 360.0, true, true)?;
    env.shadow_mut(shadow).context("missing shadow")?.step_up(12.0);

    let (position, _) = env.object(handle).context("missing object")?.position();
    assert_relative_eq!(position, GameVector::new(0.0, 0.0, 12.0), epsilon = 1.0e-3);
    Ok(())
}
