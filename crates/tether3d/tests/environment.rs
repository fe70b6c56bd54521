use anyhow::Context;
use approx::assert_relative_eq;
use tether3d::math::{GameVector, QAngle};
use tether3d::{
    CollisionFilter, CollisionModel, Environment, EnvironmentConfig, FluidParams, ObjectHandle, ObjectParams,
    PhysicsError, PhysicsObject, TriggerEvent,
};

fn weightless() -> anyhow::Result<Environment> {
    let config = EnvironmentConfig {
        gravity: GameVector::zeros(),
        ..EnvironmentConfig::default()
    };
    Ok(Environment::new(config)?)
}

fn cube(env: &mut Environment, half_extent: f32, position: GameVector, is_static: bool) -> anyhow::Result<ObjectHandle> {
    let model = CollisionModel::cuboid(GameVector::repeat(half_extent))?;
    let params = ObjectParams {
        damping: 0.0,
        rot_damping: 0.0,
        drag_coefficient: 0.0,
        ..ObjectParams::default()
    };
    Ok(env.create_object(&model, 0, &position, &QAngle::zero(), &params, is_static))
}

/// A dynamic cube resting slightly inside a static floor, awake and under gravity.
fn resting_on_floor() -> anyhow::Result<(Environment, ObjectHandle, ObjectHandle)> {
    let mut env = Environment::new(EnvironmentConfig::default())?;
    let model = CollisionModel::cuboid(GameVector::new(100.0, 100.0, 10.0))?;
    let floor = env.create_object(
        &model,
        0,
        &GameVector::zeros(),
        &QAngle::zero(),
        &ObjectParams::default(),
        true,
    );
    let body = cube(&mut env, 8.0, GameVector::new(0.0, 0.0, 17.5), false)?;
    env.object_mut(body).context("missing object")?.wake();
    env.step();
    Ok((env, floor, body))
}

struct RejectAll;

impl CollisionFilter for RejectAll {
    fn needs_collision(&self, _a: &PhysicsObject, _b: &PhysicsObject) -> bool {
        false
    }
}

#[test]
fn trigger_mode_round_trip() -> anyhow::Result<()> {
    let mut env = Environment::new(EnvironmentConfig::default())?;
    let handle = cube(&mut env, 8.0, GameVector::new(0.0, 0.0, 100.0), false)?;
    let params_flags = env.object(handle).context("missing object")?.callback_flags();
    env.object_mut(handle).context("missing object")?.enable_drag(true);

    env.object_mut(handle).context("missing object")?.become_trigger();
    {
        let body = env.object(handle).context("missing object")?;
        assert!(body.is_trigger());
        assert!(body.is_collision_enabled());
        assert!(!body.is_gravity_enabled());
        assert!(!body.is_drag_enabled());
        assert!(body.is_asleep());
    }

    for _ in 0..5 {
        env.step();
    }
    let moved = GameVector::new(10.0, 0.0, 100.0);
    env.object_mut(handle)
        .context("missing object")?
        .set_position(&moved, &QAngle::zero(), true);
    assert_relative_eq!(env.object(handle).context("missing object")?.position().0, moved, epsilon = 1.0e-3);

    env.object_mut(handle).context("missing object")?.remove_trigger();
    let body = env.object(handle).context("missing object")?;
    assert!(!body.is_trigger());
    assert!(body.is_collision_enabled());
    assert!(body.is_gravity_enabled());
    assert!(body.is_drag_enabled());
    assert_eq!(body.callback_flags(), params_flags);
    assert_relative_eq!(body.position().0, moved, epsilon = 1.0e-3);
    Ok(())
}

#[test]
fn triggers_report_overlaps() -> anyhow::Result<()> {
    let mut env = weightless()?;
    let trigger = cube(&mut env, 32.0, GameVector::zeros(), false)?;
    env.object_mut(trigger).context("missing object")?.become_trigger();

    let visitor = env.create_sphere(4.0, 0, &GameVector::zeros(), &QAngle::zero(), &ObjectParams::default(), false)?;
    env.object_mut(visitor).context("missing object")?.wake();
    env.step();

    let events = env.drain_trigger_events();
    assert!(events.contains(&TriggerEvent::Entered {
        trigger,
        object: visitor
    }));
    assert_eq!(env.object(trigger).context("missing object")?.triggered_objects(), &[visitor]);
    assert!(env.drain_trigger_events().is_empty());

    env.destroy_object(visitor)?;
    assert!(env.object(trigger).context("missing object")?.triggered_objects().is_empty());
    assert_eq!(
        env.drain_trigger_events(),
        vec![TriggerEvent::Exited {
            trigger,
            object: visitor
        }]
    );
    Ok(())
}

#[test]
fn destroyed_handles_are_rejected() -> anyhow::Result<()> {
    let mut env = weightless()?;
    let handle = cube(&mut env, 8.0, GameVector::zeros(), false)?;
    assert_eq!(env.object_count(), 1);

    env.destroy_object(handle)?;
    assert!(!env.contains(handle));
    assert!(env.object(handle).is_none());
    assert!(env.object_mut(handle).is_none());
    assert_eq!(env.object_count(), 0);
    assert_eq!(
        env.destroy_object(handle),
        Err(PhysicsError::InvalidHandle { kind: "object" })
    );
    Ok(())
}

#[test]
fn constraints_follow_their_objects() -> anyhow::Result<()> {
    let mut env = weightless()?;
    let a = cube(&mut env, 8.0, GameVector::zeros(), false)?;
    let b = cube(&mut env, 8.0, GameVector::new(32.0, 0.0, 0.0), false)?;

    let constraint = env.create_ballsocket_constraint(a, b, &GameVector::new(16.0, 0.0, 0.0))?;
    assert!(env.constraint(constraint).context("missing constraint")?.is_active());
    assert_eq!(env.object(a).context("missing object")?.constraints(), &[constraint]);
    assert!(env.object(b).context("missing object")?.is_attached_to_constraint());

    env.destroy_object(a)?;
    let joint = env.constraint(constraint).context("missing constraint")?;
    assert!(!joint.is_active());
    assert_eq!(joint.objects(), (None, Some(b)));

    env.destroy_constraint(constraint)?;
    assert!(env.constraint(constraint).is_none());
    assert!(!env.object(b).context("missing object")?.is_attached_to_constraint());
    Ok(())
}

#[test]
fn fixed_constraint_keeps_objects_together() -> anyhow::Result<()> {
    let mut env = weightless()?;
    let a = cube(&mut env, 8.0, GameVector::zeros(), false)?;
    let b = cube(&mut env, 8.0, GameVector::new(20.0, 0.0, 0.0), false)?;
    env.create_fixed_constraint(a, b)?;

    env.object_mut(a)
        .context("missing object")?
        .set_velocity(Some(&GameVector::new(0.0, 0.0, 50.0)), None);
    for _ in 0..30 {
        env.step();
    }

    let pa = env.object(a).context("missing object")?.position().0;
    let pb = env.object(b).context("missing object")?.position().0;
    assert_relative_eq!((pb - pa).norm(), 20.0, epsilon = 0.5);
    assert!((pa.z + pb.z) * 0.5 > 1.0);
    Ok(())
}

#[test]
fn transfer_carries_state_across_environments() -> anyhow::Result<()> {
    let mut source = weightless()?;
    let mut dest = weightless()?;
    let handle = cube(&mut source, 8.0, GameVector::new(5.0, 0.0, 0.0), false)?;
    {
        let mut body = source.object_mut(handle).context("missing object")?;
        body.set_velocity(Some(&GameVector::new(20.0, 0.0, 0.0)), None);
        body.enable_drag(true);
        body.set_game_index(7);
    }
    source.set_shadow(handle, 100.0, 360.0, true, true)?;

    let moved = source.transfer_object(handle, &mut dest)?;
    assert!(!source.contains(handle));
    assert_eq!(source.object_count(), 0);

    let body = dest.object(moved).context("missing object")?;
    assert_relative_eq!(body.position().0, GameVector::new(5.0, 0.0, 0.0), epsilon = 1.0e-3);
    assert_relative_eq!(body.velocity().0, GameVector::new(20.0, 0.0, 0.0), epsilon = 1.0e-3);
    assert!(body.is_drag_enabled());
    assert_eq!(body.game_index(), 7);
    assert!(body.shadow_controller().is_some());
    assert_eq!(dest.object_from_body(body.body_handle()), Some(moved));
    Ok(())
}

#[test]
fn fluid_controllers_turn_objects_into_fluids() -> anyhow::Result<()> {
    let mut env = weightless()?;
    let handle = cube(&mut env, 64.0, GameVector::zeros(), true)?;
    let params = FluidParams {
        density: 800.0,
        ..FluidParams::default()
    };

    let fluid = env.create_fluid_controller(handle, params)?;
    {
        let body = env.object(handle).context("missing object")?;
        assert!(body.is_fluid());
        assert!(body.is_trigger());
        assert_eq!(body.fluid_controller(), Some(fluid));
    }
    assert_eq!(env.fluid_controller(fluid).context("missing fluid")?.density(), 800.0);

    // Registering again only updates the parameters.
    let again = env.create_fluid_controller(handle, FluidParams::default())?;
    assert_eq!(again, fluid);
    assert_eq!(env.fluid_controller(fluid).context("missing fluid")?.density(), 1000.0);

    env.destroy_object(handle)?;
    assert!(env.fluid_controller(fluid).is_none());
    Ok(())
}

#[test]
fn rechecking_the_filter_drops_rejected_pairs() -> anyhow::Result<()> {
    let (mut env, _floor, body) = resting_on_floor()?;
    assert_eq!(env.recheck_collision_filter(), 0);

    env.set_collision_filter(RejectAll);
    assert!(env.recheck_collision_filter() > 0);
    assert!(!env.object(body).context("missing object")?.is_asleep());
    Ok(())
}

#[test]
fn friction_snapshot_reports_floor_contacts() -> anyhow::Result<()> {
    let (env, floor, body) = resting_on_floor()?;

    let snapshot = env.create_friction_snapshot(body).context("missing object")?;
    assert_eq!(snapshot.object(), body);
    assert!(!snapshot.is_empty());
    for contact in &snapshot {
        assert_eq!(contact.other, Some(floor));
        assert!(contact.normal.z < -0.9, "normal {:?}", contact.normal);
        assert!(contact.point.z < 11.0 && contact.point.z > 8.0, "point {:?}", contact.point);
    }

    let (_, other) = env
        .object(body)
        .context("missing object")?
        .contact_point()
        .context("no contact")?;
    assert_eq!(other, Some(floor));
    Ok(())
}

#[test]
fn simulation_time_accumulates() -> anyhow::Result<()> {
    let mut env = weightless()?;
    env.simulate(0.5);
    env.simulate(0.0);
    env.simulate(-0.1);
    env.simulate(f32::NAN);
    env.step();

    assert_eq!(env.step_count(), 2);
    assert_relative_eq!(env.simulation_time(), 0.5 + env.config().timestep);
    Ok(())
}
