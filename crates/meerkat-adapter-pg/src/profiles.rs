//! Companion profile table kept in sync with `auth.users`.
//!
//! Every statement is idempotent, so provisioning can be re-run to repair a
//! partially applied setup.

use sqlx::PgConnection;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS public.profiles (
    id UUID PRIMARY KEY REFERENCES auth.users(id) ON DELETE CASCADE,
    email TEXT,
    name TEXT,
    avatar_url TEXT,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
)"#;

const SYNC_FUNCTION: &str = r#"
CREATE OR REPLACE FUNCTION public.handle_user_profile_sync()
RETURNS TRIGGER
SECURITY DEFINER
SET search_path = public, auth
AS $$
BEGIN
    IF TG_OP = 'INSERT' THEN
        INSERT INTO public.profiles (id, email, name, created_at, updated_at)
        VALUES (
            NEW.id,
            NEW.email,
            COALESCE(NEW.raw_user_meta_data->>'name', NEW.raw_user_meta_data->>'full_name'),
            NEW.created_at,
            NEW.updated_at
        )
        ON CONFLICT (id) DO NOTHING;
    ELSIF TG_OP = 'UPDATE' THEN
        UPDATE public.profiles
           SET email = NEW.email,
               name = COALESCE(NEW.raw_user_meta_data->>'name', NEW.raw_user_meta_data->>'full_name', name),
               updated_at = NEW.updated_at
         WHERE id = NEW.id;
    ELSIF TG_OP = 'DELETE' THEN
        -- the row goes with the user through ON DELETE CASCADE
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql"#;

const BACKFILL: &str = r#"
INSERT INTO public.profiles (id, email, name, created_at, updated_at)
SELECT id,
       email,
       COALESCE(raw_user_meta_data->>'name', raw_user_meta_data->>'full_name'),
       created_at,
       updated_at
  FROM auth.users
ON CONFLICT (id) DO UPDATE SET
    email = EXCLUDED.email,
    name = COALESCE(EXCLUDED.name, public.profiles.name),
    updated_at = EXCLUDED.updated_at"#;

/// Statements in execution order.
pub fn statements() -> [&'static str; 10] {
    [
        CREATE_TABLE,
        "ALTER TABLE public.profiles ENABLE ROW LEVEL SECURITY",
        r#"DROP POLICY IF EXISTS "Users can view own profile" ON public.profiles"#,
        r#"CREATE POLICY "Users can view own profile" ON public.profiles FOR SELECT USING (auth.uid() = id)"#,
        r#"DROP POLICY IF EXISTS "Users can update own profile" ON public.profiles"#,
        r#"CREATE POLICY "Users can update own profile" ON public.profiles FOR UPDATE USING (auth.uid() = id)"#,
        SYNC_FUNCTION,
        "DROP TRIGGER IF EXISTS on_auth_user_profile_sync ON auth.users",
        "CREATE TRIGGER on_auth_user_profile_sync \
         AFTER INSERT OR UPDATE OR DELETE ON auth.users \
         FOR EACH ROW EXECUTE FUNCTION public.handle_user_profile_sync()",
        BACKFILL,
    ]
}

pub async fn provision(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    for statement in statements() {
        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(statement)).await?;
    }
    tracing::debug!("profile table provisioned");
    Ok(())
}
