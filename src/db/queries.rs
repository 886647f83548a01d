use sqlx::PgPool;

use crate::models::pet_video::PetVideoRecord;

/// Insert a finished video record. Records are append-only.
pub async fn insert_pet_video(pool: &PgPool, record: &PetVideoRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pet_videos
            (user_id, video_url, storage_key, image_url, script, prompt,
             voice_id, resolution, duration, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(record.user_id)
    .bind(&record.video_url)
    .bind(&record.storage_key)
    .bind(&record.image_url)
    .bind(&record.script)
    .bind(&record.prompt)
    .bind(&record.voice_id)
    .bind(&record.resolution)
    .bind(record.duration)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up a record by the storage key of its final artifact.
pub async fn get_pet_video_by_key(
    pool: &PgPool,
    storage_key: &str,
) -> Result<Option<PetVideoRecord>, sqlx::Error> {
    sqlx::query_as::<_, PetVideoRecord>(
        r#"
        SELECT user_id, video_url, storage_key, image_url, script, prompt,
               voice_id, resolution, duration, created_at
        FROM pet_videos
        WHERE storage_key = $1
        "#,
    )
    .bind(storage_key)
    .fetch_optional(pool)
    .await
}
